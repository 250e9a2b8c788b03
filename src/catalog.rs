//! Static course and shop catalogs surfaced on the dashboard, filtered by
//! subscription tier.

use serde::Serialize;

use crate::tiers::Tier;

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: &'static str,
    pub title: &'static str,
    pub min_tier: Tier,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShopItem {
    pub id: &'static str,
    pub title: &'static str,
    pub price_cents: u32,
    pub min_tier: Tier,
}

static COURSES: &[Course] = &[
    Course {
        id: "resume-basics",
        title: "Resume Basics After Release",
        min_tier: Tier::Starter,
    },
    Course {
        id: "interview-prep",
        title: "Interview Prep: Telling Your Story",
        min_tier: Tier::Starter,
    },
    Course {
        id: "credit-repair",
        title: "Credit Repair Fundamentals",
        min_tier: Tier::Trial,
    },
    Course {
        id: "llc-setup",
        title: "Starting Your LLC",
        min_tier: Tier::Plus,
    },
    Course {
        id: "bookkeeping",
        title: "Bookkeeping for First-Time Owners",
        min_tier: Tier::Plus,
    },
    Course {
        id: "contracting-bids",
        title: "Winning Contracting Bids",
        min_tier: Tier::Pro,
    },
];

static SHOP_ITEMS: &[ShopItem] = &[
    ShopItem {
        id: "planner",
        title: "Reentry 90-Day Planner",
        price_cents: 1999,
        min_tier: Tier::Starter,
    },
    ShopItem {
        id: "resume-review",
        title: "One-on-One Resume Review",
        price_cents: 4900,
        min_tier: Tier::Trial,
    },
    ShopItem {
        id: "business-plan-template",
        title: "Business Plan Template Pack",
        price_cents: 2900,
        min_tier: Tier::Plus,
    },
    ShopItem {
        id: "coaching-session",
        title: "Founder Coaching Session",
        price_cents: 12900,
        min_tier: Tier::Pro,
    },
];

pub fn courses_for(tier: Tier) -> Vec<Course> {
    COURSES
        .iter()
        .filter(|course| tier.at_least(course.min_tier))
        .cloned()
        .collect()
}

pub fn shop_for(tier: Tier) -> Vec<ShopItem> {
    SHOP_ITEMS
        .iter()
        .filter(|item| tier.at_least(item.min_tier))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_gates_catalogs() {
        let starter = courses_for(Tier::Starter);
        let pro = courses_for(Tier::Pro);
        assert!(starter.len() < pro.len());
        assert_eq!(pro.len(), 6);
        assert!(shop_for(Tier::Starter).len() < shop_for(Tier::Pro).len());
    }
}
