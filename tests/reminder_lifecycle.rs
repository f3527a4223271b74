//! End-to-end reminder lifecycles driven through chat commands.
//!
//! Every test runs on a paused tokio clock anchored at a fixed local time, so
//! days of schedule elapse instantly and delivery times are exact.

use chrono::{NaiveDate, NaiveDateTime};
use nudge::test_utils::RecordingSink;
use nudge::{AnchoredClock, Clock, CommandHandler, Owner, ReminderEngine, RepeatBudget};
use std::sync::Arc;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(86_400);

fn anchor() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2032, 3, 1)
        .expect("valid date")
        .and_hms_opt(8, 0, 0)
        .expect("valid time")
}

fn setup() -> (CommandHandler, Arc<RecordingSink>) {
    let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::new(anchor()));
    let sink = Arc::new(RecordingSink::new().with_clock(Arc::clone(&clock)));
    let engine = ReminderEngine::new(sink.clone()).with_clock(clock);
    (CommandHandler::new(engine), sink)
}

fn send(handler: &CommandHandler, owner: &Owner, text: &str) -> String {
    handler
        .handle(owner, text)
        .unwrap_or_else(|| panic!("no reply to {text}"))
}

#[tokio::test(start_paused = true)]
async fn one_time_reminder_moves_to_expired_after_firing() {
    let (handler, sink) = setup();
    let owner = Owner::new("chat-1");

    send(&handler, &owner, "/remind 01-03-2032 08:02 standup");
    assert!(sink.delivered().is_empty());

    tokio::time::sleep(Duration::from_secs(150)).await;

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].owner, owner);
    assert!(delivered[0].text.contains("standup"));

    assert_eq!(send(&handler, &owner, "/list"), "You have no active reminders.");
    let expired = send(&handler, &owner, "/expired");
    assert_eq!(expired, "Your expired reminders:\n1. 01-03-2032 08:02: standup");
}

#[tokio::test(start_paused = true)]
async fn daily_reminder_with_count_fires_on_consecutive_days() {
    let (handler, sink) = setup();
    let owner = Owner::new("chat-2");

    let reply = send(&handler, &owner, "/remind 01-03-2032 09:00 vitamins daily 3");
    assert_eq!(reply, "Repeating reminder set for 01-03-2032 09:00 (daily, 3 left)!");

    tokio::time::sleep(DAY * 4).await;

    let times: Vec<String> = sink
        .delivered()
        .iter()
        .map(|d| {
            d.at.expect("sink stamps deliveries")
                .format("%d-%m %H:%M")
                .to_string()
        })
        .collect();
    assert_eq!(times, vec!["01-03 09:00", "02-03 09:00", "03-03 09:00"]);
    assert!(
        sink.delivered()
            .iter()
            .all(|d| d.text == "Recurring reminder (daily): vitamins")
    );

    let listing = handler.engine().list(&owner);
    assert!(listing.repeating.is_empty());
    assert_eq!(listing.expired.len(), 1);
    assert_eq!(listing.expired[0].repeat_budget, Some(RepeatBudget::Remaining(0)));
    assert_eq!(handler.engine().running_tasks(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_unlimited_reminder_never_fires_again() {
    let (handler, sink) = setup();
    let owner = Owner::new("chat-3");

    send(&handler, &owner, "/remind 01-03-2032 08:30 water plants weekly");
    tokio::time::sleep(DAY * 8).await;
    assert_eq!(sink.delivered().len(), 2);

    let repeating = send(&handler, &owner, "/repeating");
    assert!(
        repeating.contains("1. 15-03-2032 08:30: water plants (repeats weekly, unlimited)"),
        "{repeating}"
    );

    assert_eq!(
        send(&handler, &owner, "/cancel 1"),
        "Cancelled repeating reminder #1: water plants"
    );
    tokio::time::sleep(DAY * 30).await;

    assert_eq!(sink.delivered().len(), 2);
    assert!(handler.engine().list(&owner).repeating.is_empty());
    assert!(send(&handler, &owner, "/expired").contains("water plants (was weekly"));
}

#[tokio::test(start_paused = true)]
async fn ordinals_span_buckets_and_out_of_range_is_harmless() {
    let (handler, sink) = setup();
    let owner = Owner::new("chat-4");

    send(&handler, &owner, "/remind 01-03-2032 08:01 coffee");
    send(&handler, &owner, "/remind 10-03-2032 12:00 lunch with sam");
    send(&handler, &owner, "/remind 01-04-2032 10:00 rent monthly");
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(sink.delivered().len(), 1);

    let before = handler.engine().list(&owner);
    assert_eq!(before.len(), 3);

    let reply = send(&handler, &owner, "/delete 4");
    assert_eq!(reply, "Error: no reminder #4; you have 3");
    assert_eq!(handler.engine().list(&owner), before);

    let reply = send(&handler, &owner, "/cancel 1");
    assert!(reply.starts_with("Error:"), "{reply}");

    // Ordinal 3 is the expired one-time reminder.
    assert_eq!(send(&handler, &owner, "/delete 3"), "Deleted reminder #3: coffee");
    assert_eq!(send(&handler, &owner, "/delete 1"), "Deleted reminder #1: lunch with sam");

    tokio::time::sleep(DAY * 10).await;
    assert_eq!(sink.delivered().len(), 1);

    let remaining = handler.engine().list(&owner);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining.repeating[0].message, "rent");
}

#[tokio::test(start_paused = true)]
async fn owners_never_see_each_others_reminders() {
    let (handler, sink) = setup();
    let alice = Owner::new("alice");
    let bob = Owner::new("bob");

    send(&handler, &alice, "/remind 01-03-2032 08:05 alice thing");
    send(&handler, &bob, "/remind 01-03-2032 08:10 bob thing");

    assert_eq!(
        send(&handler, &bob, "/delete 2"),
        "Error: no reminder #2; you have 1"
    );

    tokio::time::sleep(Duration::from_secs(15 * 60)).await;

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().any(|d| d.owner == alice && d.text.contains("alice thing")));
    assert!(delivered.iter().any(|d| d.owner == bob && d.text.contains("bob thing")));

    assert_eq!(send(&handler, &alice, "/clear"), "Cleared 1 expired reminder(s).");
    assert_eq!(handler.engine().list(&bob).expired.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_timer() {
    let (handler, sink) = setup();
    let owner = Owner::new("chat-5");

    send(&handler, &owner, "/remind 02-03-2032 08:00 tomorrow");
    send(&handler, &owner, "/remind 01-03-2032 09:00 hourly-ish daily");
    assert_eq!(handler.engine().running_tasks(), 2);

    handler.engine().shutdown().await;
    assert_eq!(handler.engine().running_tasks(), 0);

    tokio::time::sleep(DAY * 3).await;
    assert!(sink.delivered().is_empty());
}
