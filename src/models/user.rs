use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipTier {
    Basic,
    Silver,
    Gold,
    Diamond,
    /// Assigned by hand; point totals never move a user out of it.
    Premium,
}

impl MembershipTier {
    pub fn for_points(points: u32, current: MembershipTier) -> MembershipTier {
        if current == MembershipTier::Premium {
            return MembershipTier::Premium;
        }
        match points {
            p if p > 1200 => MembershipTier::Diamond,
            p if p > 600 => MembershipTier::Gold,
            p if p > 200 => MembershipTier::Silver,
            _ => MembershipTier::Basic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    #[serde(default)]
    pub points: u32,
    pub membership_tier: MembershipTier,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}
