use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

/// Calendar interval used to bucket delivered energy. All boundaries are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// Stable, lexicographically sortable key of the bucket containing `instant`.
    pub fn bucket_key(self, instant: DateTime<Utc>) -> String {
        self.date_key(instant.date_naive())
    }

    /// First instant strictly after `instant` that belongs to the next bucket.
    pub fn next_boundary(self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = instant.date_naive();
        let next_start = match self {
            Self::Daily => date.checked_add_days(Days::new(1))?,
            Self::Weekly => week_commencing(date).checked_add_days(Days::new(7))?,
            Self::Monthly => first_of_month(date).checked_add_months(Months::new(1))?,
        };

        Some(start_of_day(next_start))
    }

    /// Keys of the `count` most recent buckets ending with the one containing `now`,
    /// oldest first.
    pub fn recent_keys(self, now: DateTime<Utc>, count: usize) -> Vec<String> {
        let today = now.date_naive();
        let anchor = match self {
            Self::Daily => today,
            Self::Weekly => week_commencing(today),
            Self::Monthly => first_of_month(today),
        };

        (0..count)
            .rev()
            .filter_map(|back| {
                let steps = u32::try_from(back).ok()?;
                let date = match self {
                    Self::Daily => anchor.checked_sub_days(Days::new(u64::from(steps)))?,
                    Self::Weekly => anchor.checked_sub_days(Days::new(u64::from(steps) * 7))?,
                    Self::Monthly => anchor.checked_sub_months(Months::new(steps))?,
                };
                Some(self.date_key(date))
            })
            .collect()
    }

    fn date_key(self, date: NaiveDate) -> String {
        match self {
            Self::Daily => date.format("%Y-%m-%d").to_string(),
            Self::Weekly => week_commencing(date).format("%Y-%m-%d").to_string(),
            Self::Monthly => date.format("%Y-%m").to_string(),
        }
    }
}

/// Monday that begins the week containing `date`.
pub fn week_commencing(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn utc_from_epoch(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
