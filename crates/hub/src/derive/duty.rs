//! Shift roster: who is on duty now, and the weekly staffed hours.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Weekday};
use shared::DayHours;
use tokio::task::JoinHandle;

use super::DutyRoster;

const START_FORMAT: &str = "%I:%M:%S %p";
const RANGE_FORMAT: &str = "%-I:%M %p";
const SECS_PER_DAY: u64 = 24 * 60 * 60;
const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// One recurring weekly shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub name: String,
    pub day: Weekday,
    pub start: NaiveTime,
    pub duration: Duration,
}

impl Shift {
    /// Parse `name, day_of_week, start, duration` columns.
    pub fn parse(fields: &[String]) -> anyhow::Result<Self> {
        let [name, day, start, duration, ..] = fields else {
            anyhow::bail!("expected at least 4 columns, got {}", fields.len());
        };
        let day = day
            .trim()
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("unknown day {:?}", day))?;
        let start = NaiveTime::parse_from_str(start.trim(), START_FORMAT)
            .with_context(|| format!("bad start time {:?}", start))?;
        let duration = parse_hms(duration.trim())?;
        Ok(Self {
            name: name.trim().to_string(),
            day,
            start,
            duration,
        })
    }

    fn start_secs(&self) -> u64 {
        u64::from(self.start.num_seconds_from_midnight())
    }

    fn end_secs(&self) -> u64 {
        self.start_secs() + self.duration.as_secs()
    }

    /// Whether the shift covers `now`. A shift running past midnight only
    /// counts on its own day.
    pub fn covers(&self, now: DateTime<FixedOffset>) -> bool {
        let secs = u64::from(now.time().num_seconds_from_midnight());
        self.day == now.weekday() && secs >= self.start_secs() && secs < self.end_secs()
    }
}

fn parse_hms(s: &str) -> anyhow::Result<Duration> {
    let parts: Vec<&str> = s.split(':').collect();
    let [h, m, sec] = parts.as_slice() else {
        anyhow::bail!("bad duration {:?}", s);
    };
    let h: u64 = h.parse().with_context(|| format!("bad duration {:?}", s))?;
    let m: u64 = m.parse().with_context(|| format!("bad duration {:?}", s))?;
    let sec: u64 = sec.parse().with_context(|| format!("bad duration {:?}", s))?;
    if m >= 60 || sec >= 60 {
        anyhow::bail!("bad duration {:?}", s);
    }
    Ok(Duration::from_secs(h * 3600 + m * 60 + sec))
}

/// Split one CSV record. Handles quoted fields and doubled quotes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn format_secs(secs: u64) -> String {
    // Only called with secs <= SECS_PER_DAY; midnight wraps to 12:00 AM.
    let secs = u32::try_from(secs % SECS_PER_DAY).unwrap_or(0);
    NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
        .unwrap_or(NaiveTime::MIN)
        .format(RANGE_FORMAT)
        .to_string()
}

/// The weekly shift table, in sheet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftTable {
    shifts: Vec<Shift>,
}

impl ShiftTable {
    pub fn new(shifts: Vec<Shift>) -> Self {
        Self { shifts }
    }

    /// Parse a sheet CSV export. The header row, blank names and short rows
    /// are skipped; rows that fail to parse are skipped with a warning.
    pub fn parse_csv(text: &str) -> Self {
        let mut shifts = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let fields = split_csv_line(line);
            if fields.len() < 4 {
                continue;
            }
            let name = fields[0].trim();
            if name.is_empty() || name == "Name" {
                continue;
            }
            match Shift::parse(&fields) {
                Ok(shift) => shifts.push(shift),
                Err(e) => tracing::warn!(line = lineno + 1, error = %e, "skipping shift row"),
            }
        }
        Self { shifts }
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    /// Names whose shift covers `now`, in table order.
    pub fn on_duty(&self, now: DateTime<FixedOffset>) -> Vec<String> {
        self.shifts
            .iter()
            .filter(|shift| shift.covers(now))
            .map(|shift| shift.name.clone())
            .collect()
    }

    /// Merged staffed ranges per weekday, Monday through Sunday.
    pub fn open_hours(&self) -> Vec<DayHours> {
        WEEK.iter()
            .map(|&day| {
                let mut spans: Vec<(u64, u64)> = self
                    .shifts
                    .iter()
                    .filter(|shift| shift.day == day && !shift.duration.is_zero())
                    .map(|shift| (shift.start_secs(), shift.end_secs().min(SECS_PER_DAY)))
                    .collect();
                spans.sort_unstable();

                let mut merged: Vec<(u64, u64)> = Vec::new();
                for (start, end) in spans {
                    match merged.last_mut() {
                        Some(last) if start <= last.1 => last.1 = last.1.max(end),
                        _ => merged.push((start, end)),
                    }
                }

                DayHours {
                    day: day_name(day).to_string(),
                    ranges: merged
                        .into_iter()
                        .map(|(start, end)| format!("{} - {}", format_secs(start), format_secs(end)))
                        .collect(),
                }
            })
            .collect()
    }
}

impl DutyRoster for ShiftTable {
    fn mentors_on_duty(&self, now: DateTime<FixedOffset>) -> anyhow::Result<Vec<String>> {
        Ok(self.on_duty(now))
    }

    fn open_hours(&self) -> anyhow::Result<Vec<DayHours>> {
        Ok(ShiftTable::open_hours(self))
    }
}

/// Shift table fetched from a published sheet CSV and refreshed in the background.
pub struct SheetRoster {
    url: String,
    client: reqwest::Client,
    table: RwLock<Option<Arc<ShiftTable>>>,
}

impl SheetRoster {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
            table: RwLock::new(None),
        })
    }

    /// Fetch and replace the table. Returns the number of shifts loaded.
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let text = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let table = ShiftTable::parse_csv(&text);
        let count = table.len();
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(table));
        Ok(count)
    }

    /// Refresh now and then every `period`. Failures keep the last good table.
    pub fn spawn_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let roster = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match roster.refresh().await {
                    Ok(count) => tracing::info!(shifts = count, "shift table refreshed"),
                    Err(e) => tracing::warn!(error = %e, "shift table refresh failed"),
                }
            }
        })
    }

    fn table(&self) -> anyhow::Result<Arc<ShiftTable>> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .context("shift table not loaded yet")
    }
}

impl DutyRoster for SheetRoster {
    fn mentors_on_duty(&self, now: DateTime<FixedOffset>) -> anyhow::Result<Vec<String>> {
        Ok(self.table()?.on_duty(now))
    }

    fn open_hours(&self) -> anyhow::Result<Vec<DayHours>> {
        Ok(self.table()?.open_hours())
    }
}
