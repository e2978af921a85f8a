//! Seeded synthetic study data
//!
//! Generates tables in the raw study layout (text timestamps, efficiency as a
//! ratio) with plausible relationships between lifestyle inputs and sleep
//! quality. Used for tests, demos and smoke checks.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::schema;
use crate::table::{Cell, SleepTable};

const BEDTIME_MINUTES: [i64; 12] = [
    -180, -150, -120, -90, -60, -30, 0, 30, 60, 90, 120, 150,
];
const DURATION_HOURS: [f64; 10] = [5.0, 5.5, 6.0, 6.5, 7.0, 7.5, 8.0, 8.5, 9.0, 10.0];
const CAFFEINE_MG: [f64; 7] = [0.0, 0.0, 25.0, 50.0, 75.0, 100.0, 200.0];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Synthetic sleep-study generator
pub struct SyntheticStudy;

impl SyntheticStudy {
    /// Generate `rows` complete participant records from `seed`
    pub fn generate(rows: usize, seed: u64) -> SleepTable {
        let mut rng = StdRng::seed_from_u64(seed);
        let first_night = NaiveDate::from_ymd_opt(2021, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let first_night = match first_night {
            Some(midnight) => midnight,
            None => unreachable!("2021-01-01 00:00:00 is a valid datetime"),
        };

        let records = (0..rows)
            .map(|i| {
                let age = rng.gen_range(9..=69) as f64;
                let sex = if i % 2 == 0 { "Female" } else { "Male" };
                let smoker = match i % 5 {
                    0 => false,
                    1 => true,
                    _ => rng.gen_bool(0.3),
                };

                let midnight = first_night + Duration::days(i as i64);
                let bed_offset = BEDTIME_MINUTES[rng.gen_range(0..BEDTIME_MINUTES.len())];
                let duration = DURATION_HOURS[rng.gen_range(0..DURATION_HOURS.len())];
                let bedtime = midnight + Duration::minutes(bed_offset);
                let wakeup = bedtime + Duration::minutes((duration * 60.0) as i64);

                let awakenings = rng.gen_range(0..=4) as f64;
                let caffeine = CAFFEINE_MG[rng.gen_range(0..CAFFEINE_MG.len())];
                let alcohol = if rng.gen_bool(0.6) {
                    0.0
                } else {
                    rng.gen_range(1..=5) as f64
                };
                let exercise = rng.gen_range(0..=5) as f64;
                let smoke_penalty = if smoker { 1.0 } else { 0.0 };

                let efficiency = (0.92 - 0.04 * awakenings - 0.012 * alcohol + 0.008 * exercise
                    - 0.06 * smoke_penalty
                    - 0.0002 * caffeine
                    + rng.gen_range(-0.03..0.03))
                .clamp(0.5, 0.99);
                let rem_base: f64 = if age < 30.0 { 22.0 } else { 18.0 };
                let rem = (rem_base + rng.gen_range(-3.0..3.0))
                    .round()
                    .clamp(15.0, 30.0);
                let deep = (52.0 - 4.0 * awakenings - 3.0 * alcohol + 2.0 * exercise
                    + rng.gen_range(-5.0..5.0))
                .round()
                .clamp(15.0, 95.0 - rem);
                let light = 100.0 - rem - deep;

                vec![
                    Cell::Number((i + 1) as f64),
                    Cell::Number(age),
                    Cell::Text(sex.to_string()),
                    Cell::Text(bedtime.format(TIMESTAMP_FORMAT).to_string()),
                    Cell::Text(wakeup.format(TIMESTAMP_FORMAT).to_string()),
                    Cell::Number(duration),
                    Cell::Number((efficiency * 100.0).round() / 100.0),
                    Cell::Number(rem),
                    Cell::Number(deep),
                    Cell::Number(light),
                    Cell::Number(awakenings),
                    Cell::Number(caffeine),
                    Cell::Number(alcohol),
                    Cell::Text(crate::types::smoking_category(smoker).to_string()),
                    Cell::Number(exercise),
                ]
            })
            .collect();

        let columns = schema::RAW_COLUMNS.iter().map(|c| c.to_string()).collect();
        match SleepTable::new(columns, records) {
            Ok(table) => table,
            Err(_) => unreachable!("synthetic rows always match the raw header"),
        }
    }
}
