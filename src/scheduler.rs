//! Minute-resolution polling loop that speaks due schedules.

use chrono::{DateTime, Datelike, Local, NaiveDate, Timelike};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::audio::play_audio_bytes;
use crate::config::AppConfig;
use crate::tts::{Synthesizer, SynthesisParams};

/// Indices of schedules due at `now`: today's weekday is listed and the
/// HH:MM matches the current minute exactly.
pub fn due_indices(cfg: &AppConfig, now: DateTime<Local>) -> Vec<usize> {
    let today = crate::config::Weekday::from(now.weekday());
    let (hour, minute) = (now.hour() as u8, now.minute() as u8);
    cfg.schedules
        .iter()
        .enumerate()
        .filter(|(_, s)| s.days.contains(&today) && s.time.hour == hour && s.time.minute == minute)
        .map(|(i, _)| i)
        .collect()
}

/// Polls the clock every `check_interval` and speaks each due message.
///
/// A schedule fires at most once per (index, date); the set resets at day
/// rollover. Synthesis and playback failures are logged and the loop keeps
/// running, but a failed schedule is still marked as triggered so a broken
/// backend is not hammered once per poll for the rest of the minute.
pub async fn run_forever(
    cfg: &AppConfig,
    synthesizer: &dyn Synthesizer,
    params: &SynthesisParams,
    check_interval: Duration,
) {
    let mut triggered: HashSet<(usize, NaiveDate)> = HashSet::new();
    let mut current_day = Local::now().date_naive();

    loop {
        let now = Local::now();
        if now.date_naive() != current_day {
            triggered.clear();
            current_day = now.date_naive();
        }

        for idx in due_indices(cfg, now) {
            let day_key = (idx, now.date_naive());
            if triggered.contains(&day_key) {
                continue;
            }
            triggered.insert(day_key);

            let schedule = &cfg.schedules[idx];
            info!("🔔 Triggering schedule '{}' @ {}", schedule.name, schedule.time);
            match synthesizer.synthesize(&schedule.message, params).await {
                Ok(audio) => {
                    if let Err(e) = play_audio_bytes(&audio, params.audio_encoding).await {
                        warn!("Playback failed for '{}': {e:#}", schedule.name);
                    }
                }
                Err(e) => {
                    error!("Synthesis failed for '{}': {e}", schedule.name);
                }
            }
        }

        tokio::time::sleep(check_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Schedule, ScheduleTime, Weekday};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn cfg_at(hour: u8, minute: u8, days: Vec<Weekday>) -> AppConfig {
        AppConfig {
            schedules: vec![Schedule {
                name: "A".to_string(),
                time: ScheduleTime { hour, minute },
                days,
                message: "m".to_string(),
            }],
        }
    }

    // 2024-01-01 was a Monday.
    fn monday_at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn due_when_minute_and_day_match() {
        let cfg = cfg_at(7, 0, vec![Weekday::Mon]);
        assert_eq!(due_indices(&cfg, monday_at(7, 0)), vec![0]);
    }

    #[test]
    fn not_due_on_wrong_minute() {
        let cfg = cfg_at(7, 1, vec![Weekday::Mon]);
        assert_eq!(due_indices(&cfg, monday_at(7, 0)), Vec::<usize>::new());
    }

    #[test]
    fn not_due_on_wrong_day() {
        let cfg = cfg_at(7, 0, vec![Weekday::Tue]);
        assert_eq!(due_indices(&cfg, monday_at(7, 0)), Vec::<usize>::new());
    }

    #[test]
    fn multiple_schedules_due_in_same_minute() {
        let mut cfg = cfg_at(6, 30, vec![Weekday::Mon]);
        cfg.schedules.push(Schedule {
            name: "B".to_string(),
            time: ScheduleTime { hour: 6, minute: 30 },
            days: vec![Weekday::Mon, Weekday::Sun],
            message: "n".to_string(),
        });
        assert_eq!(due_indices(&cfg, monday_at(6, 30)), vec![0, 1]);
    }
}
