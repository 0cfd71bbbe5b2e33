use chrono::{NaiveTime, Timelike};

/// Wall-clock time of day at which the daily job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime(NaiveTime);

impl DailyTime {
    pub fn parse(hour: u32, minute: u32, second: u32) -> Result<DailyTime, String> {
        NaiveTime::from_hms_opt(hour, minute, second)
            .map(Self)
            .ok_or_else(|| {
                format!(
                    "{:02}:{:02}:{:02} is not a valid time of day",
                    hour, minute, second
                )
            })
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl std::fmt::Display for DailyTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }
}
