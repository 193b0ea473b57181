//! Cron expression and timezone validation, plus next-fire computation.
//!
//! Schedules use classic 5-field syntax (min hour dom mon dow). The `cron`
//! crate wants a leading seconds field and 1-based weekdays, so expressions
//! are translated before being handed to it.

use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use datapipe_core::ScheduleSpec;

const VALID_RANGES: &[(u32, u32)] = &[
    (0, 59), // minute
    (0, 23), // hour
    (1, 31), // day of month
    (1, 12), // month
    (0, 7),  // day of week (0 and 7 both = Sunday)
];

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Validate a 5-field cron expression and return it with normalized spacing.
///
/// An expression is only accepted if it can also be evaluated by `next_fire`.
pub fn validate_cron(expr: &str) -> Result<String> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() != 5 {
        bail!("Cron expression must have exactly 5 fields, got {}: '{}'", parts.len(), expr);
    }
    for (i, part) in parts.iter().enumerate() {
        validate_field(part, VALID_RANGES[i].0, VALID_RANGES[i].1)
            .map_err(|e| anyhow!("Field {} ('{}') invalid: {}", i + 1, part, e))?;
    }
    let normalized = parts.join(" ");
    parse_schedule(&normalized)?;
    Ok(normalized)
}

fn parse_schedule(normalized: &str) -> Result<Schedule> {
    Schedule::from_str(&to_cron_crate_syntax(normalized)?)
        .with_context(|| format!("Unsupported cron expression '{normalized}'"))
}

/// Check whether a cron field is syntactically valid within [min, max].
fn validate_field(field: &str, min: u32, max: u32) -> Result<()> {
    if field == "*" || field == "?" {
        return Ok(());
    }
    let range_part = match field.split_once('/') {
        Some((r, s)) => {
            let step: u32 = s.parse().map_err(|_| anyhow!("step '{}' not numeric", s))?;
            if step == 0 {
                bail!("step must be > 0");
            }
            r
        }
        None => field,
    };

    for part in range_part.split(',') {
        if part == "*" {
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| anyhow!("'{}' not numeric", lo))?;
            let hi: u32 = hi.parse().map_err(|_| anyhow!("'{}' not numeric", hi))?;
            if lo > hi || lo < min || hi > max {
                bail!("range {}-{} out of [{}, {}]", lo, hi, min, max);
            }
        } else {
            let v: u32 = part.parse().map_err(|_| anyhow!("'{}' not numeric", part))?;
            if v < min || v > max {
                bail!("value {} out of [{}, {}]", v, min, max);
            }
        }
    }
    Ok(())
}

/// Timezone a schedule is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CronTimezone {
    Utc,
    FixedOffset(FixedOffset),
    Named(Tz),
}

/// Accepts `UTC`, an IANA name (`Europe/Berlin`), or an offset (`+08:00`, `-0530`).
pub fn parse_timezone(raw: &str) -> Result<CronTimezone> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") {
        return Ok(CronTimezone::Utc);
    }
    if let Ok(tz) = trimmed.parse::<Tz>() {
        return Ok(CronTimezone::Named(tz));
    }
    if let Some(offset) = parse_fixed_offset(trimmed) {
        return Ok(CronTimezone::FixedOffset(offset));
    }
    bail!(
        "Invalid timezone '{}'. Use UTC, an IANA name (e.g. 'Europe/Berlin') or an offset (e.g. '+08:00')",
        raw
    )
}

fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let sign = match raw.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let rest = &raw[1..];
    if !rest.is_ascii() {
        return None;
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if rest.len() == 4 => (rest[0..2].parse::<i32>().ok()?, rest[2..4].parse::<i32>().ok()?),
        None => return None,
    };
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Validate both the cron expression and the timezone of a schedule.
pub fn validate_schedule(spec: &ScheduleSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        bail!("Schedule name cannot be empty");
    }
    validate_cron(&spec.cron_expression)?;
    parse_timezone(&spec.timezone)?;
    Ok(())
}

/// Next instant strictly after `after` at which the schedule fires.
pub fn next_fire(spec: &ScheduleSpec, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let normalized = validate_cron(&spec.cron_expression)?;
    let schedule = parse_schedule(&normalized)?;

    let next = match parse_timezone(&spec.timezone)? {
        CronTimezone::Utc => schedule.after(&after).next(),
        CronTimezone::FixedOffset(offset) => schedule
            .after(&after.with_timezone(&offset))
            .next()
            .map(|t| t.with_timezone(&Utc)),
        CronTimezone::Named(tz) => schedule
            .after(&after.with_timezone(&tz))
            .next()
            .map(|t| t.with_timezone(&Utc)),
    };
    Ok(next)
}

/// Prepend a seconds field and spell weekdays by name.
fn to_cron_crate_syntax(normalized: &str) -> Result<String> {
    let mut fields: Vec<String> = normalized
        .split(' ')
        .map(|f| if f == "?" { "*".to_string() } else { f.to_string() })
        .collect();
    if let Some(dow) = fields.last_mut() {
        *dow = translate_weekdays(dow)?;
    }
    Ok(format!("0 {}", fields.join(" ")))
}

/// Expand a day-of-week field into the days it selects and list them by
/// name. `7` folds onto Sunday; a field covering the whole week becomes `*`.
fn translate_weekdays(field: &str) -> Result<String> {
    if field == "*" {
        return Ok(field.to_string());
    }
    let days = weekday_set(field)?;
    if days.len() == WEEKDAYS.len() {
        return Ok("*".to_string());
    }
    Ok(days
        .iter()
        .map(|&d| WEEKDAYS[d as usize])
        .collect::<Vec<_>>()
        .join(","))
}

fn weekday_set(field: &str) -> Result<BTreeSet<u32>> {
    let (max_lo, max_hi) = VALID_RANGES[4];
    let (range_part, step) = match field.split_once('/') {
        Some((r, s)) => (r, Some(s.parse::<u32>().map_err(|_| anyhow!("step '{}' not numeric", s))?)),
        None => (field, None),
    };
    let step = step.unwrap_or(1).max(1);

    let mut days = BTreeSet::new();
    for part in range_part.split(',') {
        let (lo, hi) = match part.split_once('-') {
            _ if part == "*" || part == "?" => (max_lo, max_hi),
            Some((lo, hi)) => (parse_day(lo)?, parse_day(hi)?),
            // `N/step` runs from N to the end of the week.
            None if step > 1 => (parse_day(part)?, max_hi),
            None => {
                let day = parse_day(part)?;
                (day, day)
            }
        };
        for day in (lo..=hi).step_by(step as usize) {
            days.insert(day % 7);
        }
    }
    if days.is_empty() {
        bail!("day-of-week field '{}' selects no days", field);
    }
    Ok(days)
}

fn parse_day(token: &str) -> Result<u32> {
    let day: u32 = token
        .parse()
        .map_err(|_| anyhow!("'{}' not numeric", token))?;
    if day > VALID_RANGES[4].1 {
        bail!("day {} out of [0, 7]", day);
    }
    Ok(day)
}
