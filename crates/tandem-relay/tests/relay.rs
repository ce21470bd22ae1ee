use tandem_relay::{Authority, AuthorityConfig, Participant, RelayError};
use tandem_testing::{counter_system, Counter};

#[tokio::test]
async fn test_two_participants_converge() {
    let fx = counter_system();
    let inc = fx.inc.clone();
    let authority = Authority::new(fx.system);

    let mut alice = Participant::new("alice", counter_system().system);
    let mut bob = Participant::new("bob", counter_system().system);
    let mut alice_rx = authority.subscribe();
    let mut bob_rx = authority.subscribe();

    let alice_event = inc.event(&2).unwrap();
    let bob_event = inc.event(&3).unwrap();

    alice.propose(&alice_event).unwrap();
    bob.propose(&bob_event).unwrap();
    // (0 + 5) * 2 locally for alice, (0 + 3) * 3 for bob
    assert_eq!(alice.system().optimistic_state().data, 10);
    assert_eq!(bob.system().optimistic_state().data, 9);

    authority.submit("alice", &alice_event).await.unwrap();

    assert_eq!(alice.catch_up(&mut alice_rx).unwrap(), 1);
    assert_eq!(bob.catch_up(&mut bob_rx).unwrap(), 1);
    assert_eq!(alice.system().pending_len(), 0);
    assert_eq!(alice.system().optimistic_state().data, 10);
    // bob's prediction replays on top of alice's confirmed event: (10 + 3) * 3
    assert_eq!(bob.system().optimistic_state().data, 39);

    authority.submit("bob", &bob_event).await.unwrap();
    alice.catch_up(&mut alice_rx).unwrap();
    bob.apply_next(&mut bob_rx).await.unwrap();

    let truth = authority.source_state().await;
    assert_eq!(*truth, Counter::new(39));
    assert_eq!(alice.system().source_state(), truth);
    assert_eq!(bob.system().source_state(), truth);
    assert_eq!(bob.system().pending_len(), 0);
}

#[tokio::test]
async fn test_lagged_participant_resyncs_from_history() {
    let fx = counter_system();
    let inc = fx.inc.clone();
    let config = AuthorityConfig {
        capacity: 2,
        ..AuthorityConfig::default()
    };
    let authority = Authority::with_config(fx.system, &config);

    let mut carol = Participant::new("carol", counter_system().system);
    let mut rx = authority.subscribe();

    for amount in 1..=5 {
        authority.submit("root", &inc.event(&amount).unwrap()).await.unwrap();
    }

    let err = carol.catch_up(&mut rx).unwrap_err();
    assert!(matches!(err, RelayError::Lagged(3)));
    assert!(err.needs_resync());

    let report = carol.resync(&authority.history().await);
    assert!(report.is_clean());
    assert_eq!(carol.last_sequence(), 5);
    assert_eq!(carol.system().source_state(), authority.source_state().await);

    // The two messages still buffered are already covered by history
    assert_eq!(carol.catch_up(&mut rx).unwrap(), 2);
    assert_eq!(carol.system().source_state(), authority.source_state().await);
}

#[tokio::test]
async fn test_late_joiner() {
    let fx = counter_system();
    let inc = fx.inc.clone();
    let authority = Authority::new(fx.system);

    authority.submit("root", &inc.event(&2).unwrap()).await.unwrap();
    authority.submit("admin", &inc.event(&3).unwrap()).await.unwrap();

    let mut dave = Participant::new("dave", counter_system().system);
    let (history, mut rx) = authority.join().await;
    dave.resync(&history);

    authority.submit("dave", &inc.event(&1).unwrap()).await.unwrap();
    dave.apply_next(&mut rx).await.unwrap();

    // (0 + 4) * 2 = 8, (8 + 5) * 3 = 39, (39 + 4) * 1 = 43
    assert_eq!(dave.system().source_state().data, 43);
    assert_eq!(*authority.source_state().await, Counter::new(43));
}

#[tokio::test]
async fn test_authority_shared_across_tasks() {
    let fx = counter_system();
    let inc = fx.inc.clone();
    let authority = Authority::new(fx.system);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let authority = authority.clone();
        let event = inc.event(&1).unwrap();
        handles.push(tokio::spawn(async move {
            authority.submit("a", &event).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let history = authority.history().await;
    let sequences: Vec<u64> = history.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, (1..=8).collect::<Vec<_>>());
    // Each step is (data + 1) * 1
    assert_eq!(authority.source_state().await.data, 8);
}

#[tokio::test]
async fn test_subscribing_without_history_is_caught() {
    let fx = counter_system();
    let inc = fx.inc.clone();
    let config = AuthorityConfig {
        digest_interval: 0,
        ..AuthorityConfig::default()
    };
    let authority = Authority::with_config(fx.system, &config);

    authority.submit("root", &inc.event(&2).unwrap()).await.unwrap();

    // Subscribes after history exists but never loads it
    let mut erin = Participant::new("erin", counter_system().system);
    let mut rx = authority.subscribe();
    authority.submit("root", &inc.event(&3).unwrap()).await.unwrap();

    let err = erin.catch_up(&mut rx).unwrap_err();
    assert!(matches!(err, RelayError::SequenceGap { expected: 1, received: 2 }));
    assert_eq!(erin.system().source_state().data, 0);

    erin.resync(&authority.history().await);
    assert_eq!(erin.system().source_state(), authority.source_state().await);
}
