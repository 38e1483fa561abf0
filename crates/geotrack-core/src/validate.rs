//! Input validation rules enforced at the service edges

use crate::error::{CoreError, CoreResult};
use crate::geo::GeoPoint;

/// Shortest accepted username
pub const USERNAME_MIN_LEN: usize = 4;
/// Longest accepted username
pub const USERNAME_MAX_LEN: usize = 16;

/// Usernames are ASCII alphanumeric, 4 to 16 characters
pub fn validate_username(username: &str) -> CoreResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(CoreError::invalid_username(
            username,
            format!("length must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN}"),
        ));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::invalid_username(
            username,
            "only ASCII letters and digits are allowed",
        ));
    }

    Ok(())
}

pub fn validate_position(point: &GeoPoint) -> CoreResult<()> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(CoreError::invalid_position(point.latitude, point.longitude))
    }
}

pub fn validate_radius(radius_km: f64) -> CoreResult<()> {
    if radius_km.is_finite() && radius_km > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidRadius(radius_km))
    }
}

/// Page numbers are 1-based; both values must be at least 1
pub fn validate_paging(page: u32, page_size: u32) -> CoreResult<()> {
    if page == 0 {
        return Err(CoreError::invalid_page("page must be at least 1"));
    }
    if page_size == 0 {
        return Err(CoreError::invalid_page("page size must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_length_bounds() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_err());
        assert!(validate_username("abcd").is_ok());
        assert!(validate_username("a234567890123456").is_ok());
        assert!(validate_username("a2345678901234567").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_username_charset() {
        assert!(validate_username("alice42").is_ok());
        assert!(validate_username("ALICE").is_ok());
        assert!(validate_username("alice_42").is_err());
        assert!(validate_username("al ce").is_err());
        assert!(validate_username("ålice").is_err());
    }

    #[test]
    fn test_short_username_error_kind() {
        let err = validate_username("ab").unwrap_err();
        assert!(matches!(err, CoreError::InvalidUsername { .. }));
    }

    #[test]
    fn test_position_bounds() {
        assert!(validate_position(&GeoPoint::new(90.0, -180.0)).is_ok());
        assert_eq!(
            validate_position(&GeoPoint::new(90.5, 0.0)),
            Err(CoreError::invalid_position(90.5, 0.0))
        );
        assert!(validate_position(&GeoPoint::new(0.0, -180.01)).is_err());
    }

    #[test]
    fn test_radius() {
        assert!(validate_radius(0.01).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-1.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
        assert!(validate_radius(f64::INFINITY).is_err());
    }

    #[test]
    fn test_paging() {
        assert!(validate_paging(1, 1).is_ok());
        assert!(validate_paging(0, 10).is_err());
        assert!(validate_paging(1, 0).is_err());
    }
}
