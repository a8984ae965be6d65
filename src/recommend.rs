use crate::models::{PembinaanTier, Recommendation};

/// Maps point totals to coaching tiers. Tiers are kept in `display_order`.
#[derive(Debug, Clone, Default)]
pub struct PembinaanRecommender {
    tiers: Vec<PembinaanTier>,
}

impl PembinaanRecommender {
    pub fn new(mut tiers: Vec<PembinaanTier>) -> Self {
        tiers.sort_by_key(|tier| (tier.display_order, tier.id));
        Self { tiers }
    }

    /// First tier whose range contains `total_points`, or `None`.
    ///
    /// The result is advisory; opening a coaching case is up to the caller.
    pub fn recommend(&self, total_points: i64) -> Option<Recommendation> {
        self.tiers
            .iter()
            .find(|tier| tier.contains(total_points))
            .map(|tier| Recommendation {
                roles: tier.roles.clone(),
                description: tier.description.clone(),
                range_label: tier.range_label(),
            })
    }
}
