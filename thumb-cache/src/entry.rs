use chrono::{DateTime, Utc};

/// A cached value and the instant it stops being served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    /// `None` never expires
    pub fn new(value: V, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { value, expires_at }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let entry = CacheEntry::new("v", Some(now));
        assert!(entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now - Duration::seconds(1)));
        assert!(!CacheEntry::new("v", None).is_expired());
    }
}
