use crate::error::{NotifyError, Result};
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Per-device quiet-hours window, evaluated in the device's own IANA
/// timezone. Windows crossing midnight are supported: with
/// `start > end` (e.g., 22:00-07:00), "in window" means
/// `current >= start || current < end`.
#[derive(Debug, Clone)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
    /// Critical notifications bypass the window when set.
    pub override_critical: bool,
}

impl QuietHours {
    /// Parses the persisted `HH:MM` strings and IANA zone name.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidConfig`] for unparseable times or an
    /// unknown timezone.
    pub fn parse(start: &str, end: &str, timezone: &str, override_critical: bool) -> Result<Self> {
        let start = NaiveTime::parse_from_str(start, "%H:%M")
            .map_err(|_| NotifyError::InvalidConfig(format!("quiet hours start '{start}'")))?;
        let end = NaiveTime::parse_from_str(end, "%H:%M")
            .map_err(|_| NotifyError::InvalidConfig(format!("quiet hours end '{end}'")))?;
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| NotifyError::InvalidConfig(format!("quiet hours timezone '{timezone}'")))?;
        Ok(Self {
            start,
            end,
            timezone,
            override_critical,
        })
    }

    /// Whether local time at `now` falls inside the window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let current = now.with_timezone(&self.timezone).time();
        if self.start <= self.end {
            current >= self.start && current < self.end
        } else {
            // Overnight window (e.g., 22:00 - 07:00)
            current >= self.start || current < self.end
        }
    }

    /// Whether a notification should be suppressed for this device at
    /// `now`. Critical notifications pass through when the device opted
    /// into the critical override.
    pub fn suppresses(&self, critical: bool, now: DateTime<Utc>) -> bool {
        if critical && self.override_critical {
            return false;
        }
        self.is_active(now)
    }
}
