//! Onboarding step sequencer: maps the stored `onboarding_step` counter to
//! a canonical route and decides page-guard redirects.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{FelonEntrepreneurError, Result};

static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").expect("zip regex"));

const MAX_NAME_LEN: usize = 80;

/// Canonical onboarding routes in progression order. `Ord` follows the
/// sequence, so a later route never compares below an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepRoute {
    Name,
    Zip,
    PathChoice,
    Generating,
    Home,
}

impl StepRoute {
    pub fn path(&self) -> &'static str {
        match self {
            StepRoute::Name => "/onboarding/name",
            StepRoute::Zip => "/onboarding/zip",
            StepRoute::PathChoice => "/onboarding/path",
            StepRoute::Generating => "/onboarding/generating",
            StepRoute::Home => "/app/home",
        }
    }

    /// The `onboarding_step` value a user sits at while this page is the
    /// canonical one.
    pub fn expected_step(&self) -> i64 {
        match self {
            StepRoute::Name => 0,
            StepRoute::Zip => 1,
            StepRoute::PathChoice => 2,
            StepRoute::Generating => 3,
            StepRoute::Home => 4,
        }
    }

    /// Step value this page's submit advances the profile to.
    pub fn submit_target(&self) -> i64 {
        self.expected_step() + 1
    }
}

/// Total over all integers: negative and missing steps land on the name
/// page, anything from 4 up lands on the app home.
pub fn route_for_step(step: Option<i64>) -> StepRoute {
    match step {
        None => StepRoute::Name,
        Some(step) if step <= 0 => StepRoute::Name,
        Some(1) => StepRoute::Zip,
        Some(2) => StepRoute::PathChoice,
        Some(3) => StepRoute::Generating,
        Some(_) => StepRoute::Home,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Proceed,
    Redirect(StepRoute),
}

/// Page-guard decision: proceed only when the requested page is the
/// canonical route for the stored step. A stored step past the page
/// redirects forward (replay prevention); a missing prerequisite redirects
/// backward (skip prevention).
pub fn guard(step: Option<i64>, page: StepRoute) -> Guard {
    let canonical = route_for_step(step);
    if canonical == page {
        Guard::Proceed
    } else {
        Guard::Redirect(canonical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathChoice {
    Employment,
    Business,
}

impl PathChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathChoice::Employment => "employment",
            PathChoice::Business => "business",
        }
    }
}

impl std::str::FromStr for PathChoice {
    type Err = ();

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim() {
            "employment" => Ok(PathChoice::Employment),
            "business" => Ok(PathChoice::Business),
            _ => Err(()),
        }
    }
}

pub fn validate_preferred_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FelonEntrepreneurError::Runtime(
            "preferred name must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(FelonEntrepreneurError::Runtime(format!(
            "preferred name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_zip(zip: &str) -> Result<String> {
    let trimmed = zip.trim();
    if !ZIP_RE.is_match(trimmed) {
        return Err(FelonEntrepreneurError::Runtime(
            "ZIP code must be five digits".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_path_choice(value: &str) -> Result<PathChoice> {
    value.parse().map_err(|_| {
        FelonEntrepreneurError::Runtime("path must be 'employment' or 'business'".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_is_total_and_monotonic() {
        let mut previous = route_for_step(Some(i64::MIN));
        for step in -3..10 {
            let route = route_for_step(Some(step));
            assert!(route >= previous, "step {step} regressed the route");
            previous = route;
        }
        assert_eq!(route_for_step(None), StepRoute::Name);
        assert_eq!(route_for_step(Some(i64::MIN)), StepRoute::Name);
        assert_eq!(route_for_step(Some(i64::MAX)), StepRoute::Home);
    }

    #[test]
    fn canonical_routes_per_step() {
        assert_eq!(route_for_step(Some(0)), StepRoute::Name);
        assert_eq!(route_for_step(Some(1)), StepRoute::Zip);
        assert_eq!(route_for_step(Some(2)), StepRoute::PathChoice);
        assert_eq!(route_for_step(Some(3)), StepRoute::Generating);
        assert_eq!(route_for_step(Some(4)), StepRoute::Home);
        assert_eq!(route_for_step(Some(5)), StepRoute::Home);
    }

    #[test]
    fn guard_redirects_forward_and_backward() {
        assert_eq!(
            guard(Some(4), StepRoute::Name),
            Guard::Redirect(StepRoute::Home)
        );
        assert_eq!(
            guard(Some(0), StepRoute::PathChoice),
            Guard::Redirect(StepRoute::Name)
        );
        assert_eq!(guard(Some(2), StepRoute::PathChoice), Guard::Proceed);
        assert_eq!(guard(None, StepRoute::Name), Guard::Proceed);
    }

    #[test]
    fn validation_rejects_bad_input() {
        assert!(validate_preferred_name("  ").is_err());
        assert!(validate_preferred_name(" Dee ").is_ok());
        assert!(validate_zip("3360").is_err());
        assert!(validate_zip("33602").is_ok());
        assert!(validate_zip("3360a").is_err());
        assert!(validate_path_choice("business").is_ok());
        assert!(validate_path_choice("crypto").is_err());
    }
}
