use crate::entity::Uid;
use crate::model::Booking;
use crate::store::Store;
use std::collections::HashMap;
use tracing::debug;

/// Resolves uids to display names with session-lifetime memoization: at
/// most one store lookup per distinct uid, ever. A failed or empty lookup
/// is cached too, so the fallback (the raw uid) is stable across passes.
pub struct NameResolver {
    cache: HashMap<Uid, Option<String>>,
    lookups: usize,
}

impl NameResolver {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            lookups: 0,
        }
    }

    /// Resolved display name for one uid; the uid itself when nothing
    /// better exists. A single failing lookup never fails the caller.
    pub async fn display_name(&mut self, store: &Store, id: &Uid) -> String {
        if !self.cache.contains_key(id) {
            self.lookups += 1;
            let resolved = match store.get_user(id).await {
                Ok(Some(user)) => user.best_name(),
                Ok(None) => None,
                Err(e) => {
                    debug!("name lookup for {id} failed, falling back to uid: {e:#}");
                    None
                }
            };
            self.cache.insert(id.clone(), resolved);
        }
        self.cache
            .get(id)
            .and_then(|n| n.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Fill missing `full_name`s on a batch of bookings. Records that
    /// already carry a name are untouched; the rest share one lookup per
    /// distinct uid.
    pub async fn resolve_booking_names(
        &mut self,
        store: &Store,
        bookings: Vec<Booking>,
    ) -> Vec<Booking> {
        let mut resolved = Vec::with_capacity(bookings.len());
        for mut booking in bookings {
            if booking.full_name.is_none() {
                let user_id = booking.user_id.clone();
                booking.full_name = Some(self.display_name(store, &user_id).await);
            }
            resolved.push(booking);
        }
        resolved
    }

    /// Store lookups performed so far; memoization keeps this at one per
    /// distinct uid.
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserRecord;
    use crate::model::BookingStatus;
    use crate::testutil;

    fn user(id: &str, full: Option<&str>, first: Option<&str>, last: Option<&str>) -> UserRecord {
        UserRecord {
            id: Uid::new(id),
            full_name: full.map(String::from),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn enrichment_is_idempotent_and_deduplicates_lookups() {
        let (_bus, store) = testutil::store().await;
        store
            .insert_user(&user("user-b1", Some("Maria Santos"), None, None))
            .await
            .unwrap();
        store
            .insert_user(&user("user-b2", None, Some("Jo"), Some("Cruz")))
            .await
            .unwrap();

        // Two bookings share user-b1; user-b3 does not exist in the store.
        let mut bookings = vec![
            testutil::booking("b1", "doc", BookingStatus::Pending, false),
            testutil::booking("b2", "doc", BookingStatus::Pending, false),
            testutil::booking("b3", "doc", BookingStatus::Pending, false),
        ];
        bookings.push({
            let mut dup = testutil::booking("b4", "doc", BookingStatus::Pending, false);
            dup.user_id = Uid::new("user-b1");
            dup
        });

        let mut resolver = NameResolver::new();
        let first_pass = resolver
            .resolve_booking_names(&store, bookings.clone())
            .await;

        assert_eq!(first_pass[0].full_name.as_deref(), Some("Maria Santos"));
        assert_eq!(first_pass[1].full_name.as_deref(), Some("Jo Cruz"));
        // Unknown user falls back to the raw uid without failing the batch.
        assert_eq!(first_pass[2].full_name.as_deref(), Some("user-b3"));
        assert_eq!(first_pass[3].full_name.as_deref(), Some("Maria Santos"));
        // Three distinct uids, three lookups, despite four bookings.
        assert_eq!(resolver.lookups(), 3);

        let second_pass = resolver.resolve_booking_names(&store, bookings).await;
        for (a, b) in first_pass.iter().zip(second_pass.iter()) {
            assert_eq!(a.full_name, b.full_name);
        }
        assert_eq!(resolver.lookups(), 3);
    }

    #[tokio::test]
    async fn existing_names_are_left_alone() {
        let (_bus, store) = testutil::store().await;
        let mut booking = testutil::booking("b1", "doc", BookingStatus::Pending, false);
        booking.full_name = Some("Prefilled Name".into());

        let mut resolver = NameResolver::new();
        let resolved = resolver.resolve_booking_names(&store, vec![booking]).await;
        assert_eq!(resolved[0].full_name.as_deref(), Some("Prefilled Name"));
        assert_eq!(resolver.lookups(), 0);
    }
}
