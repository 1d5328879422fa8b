// orderlog-watcher - core/alarm.rs
//
// Component J: the alarm notifier. Pure decision logic - "does this
// newly-inserted message warrant a notification, and to whom" - plus a
// small `AlarmSink` trait so the decision is testable without a live
// mail transport. Email transport itself is an explicit non-goal
// (spec §1); `LoggingAlarmSink` (the default, and what tests use) and
// `NullAlarmSink` are the two sinks this crate ships.

use super::model::{LogItem, MessageStatus, Order};

/// A decorated message ready for an `AlarmSink`, assembled once the
/// decision predicate in `evaluate` has already passed.
#[derive(Debug, Clone)]
pub struct AlarmDecision {
    pub order: Order,
    pub item: LogItem,
    pub primary_recipients: Vec<String>,
    pub customer_recipient: Option<CustomerAlarmRecipient>,
}

/// The "alarm-to-customer" second recipient: `title:address:substring`,
/// triggered only when `substring` occurs in the message text.
#[derive(Debug, Clone)]
pub struct CustomerAlarmRecipient {
    pub title: String,
    pub address: String,
}

/// Fires only when every condition in §4.J holds:
/// - the message was newly inserted (`MessageStatus::New`),
/// - the item's severity is in the adapter's alarm set (checked by the
///   caller via `parser::is_alarmable` before calling `evaluate`, so
///   this function takes `is_alarmable` as a precondition rather than
///   re-deriving it),
/// - mailing is configured at all - i.e. `emergency` or the
///   `alarms` (alarm-to-customer) list is non-empty; there is no
///   separate on/off switch,
/// - if `mailkeys` is non-empty, at least one substring occurs in the
///   client name, file name, or message text.
pub fn evaluate(
    status: MessageStatus,
    is_alarmable: bool,
    order: &Order,
    item: &LogItem,
    file_name: &str,
    mailkeys: &[String],
    emergency: &[String],
    alarm_to_customer: &[String],
) -> Option<AlarmDecision> {
    let mailing_enabled = !emergency.is_empty() || !alarm_to_customer.is_empty();
    if status != MessageStatus::New || !is_alarmable || !mailing_enabled {
        return None;
    }

    if !mailkeys.is_empty() {
        let haystacks = [order.client.as_str(), file_name, item.message.as_str()];
        let hit = mailkeys
            .iter()
            .any(|key| haystacks.iter().any(|h| h.contains(key.as_str())));
        if !hit {
            return None;
        }
    }

    let customer_recipient = alarm_to_customer.iter().find_map(|entry| {
        let mut parts = entry.splitn(3, ':');
        let title = parts.next()?;
        let address = parts.next()?;
        let substring = parts.next()?;
        if item.message.contains(substring) {
            Some(CustomerAlarmRecipient {
                title: title.to_string(),
                address: address.to_string(),
            })
        } else {
            None
        }
    });

    Some(AlarmDecision {
        order: order.clone(),
        item: item.clone(),
        primary_recipients: emergency.to_vec(),
        customer_recipient,
    })
}

/// The pluggable notification seam. A real SMTP sink can implement this
/// without touching the correlation engine; the return value is purely
/// informational (ignored by message state transitions, per the alarm
/// idempotence invariant in §8).
pub trait AlarmSink {
    fn notify(&self, decision: &AlarmDecision) -> bool;
}

/// Default sink: writes the alarm to the audit log rather than sending
/// mail. Used whenever a real transport is not configured, and in tests.
#[derive(Debug, Default)]
pub struct LoggingAlarmSink;

impl AlarmSink for LoggingAlarmSink {
    fn notify(&self, decision: &AlarmDecision) -> bool {
        tracing::warn!(
            order_id = decision.order.id,
            client = %decision.order.client,
            severity = %decision.item.severity,
            recipients = ?decision.primary_recipients,
            customer = decision.customer_recipient.as_ref().map(|c| c.address.as_str()),
            message = %decision.item.message,
            "alarm"
        );
        true
    }
}

/// Used when mailing is disabled entirely; never notifies.
#[derive(Debug, Default)]
pub struct NullAlarmSink;

impl AlarmSink for NullAlarmSink {
    fn notify(&self, _decision: &AlarmDecision) -> bool {
        false
    }
}
