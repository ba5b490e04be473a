//! Input validation for API requests.
//!
//! Validators return `Err(message)` for the first problem found. Handlers
//! collect them per field with `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email check: something@something.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Invitation codes: 8 characters, uppercase letters and digits
    static ref INVITE_CODE_REGEX: Regex = Regex::new(
        r"^[A-Z0-9]{8}$"
    ).unwrap();

    /// Phone numbers: optional leading +, digits with spaces, dashes or dots
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9][0-9 .\-]{5,19}$"
    ).unwrap();

    /// Canonical hyphenated UUID
    static ref UUID_REGEX: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    ).unwrap();
}

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Largest points amount accepted in a single ledger request
pub const MAX_POINTS_PER_REQUEST: i64 = 1_000_000;

pub use crate::store::MAX_CART_QUANTITY;

/// Highest product price, in minor currency units
pub const MAX_PRICE: i64 = 100_000_000;

/// Highest points requirement or points discount on one product
pub const MAX_PRODUCT_POINTS: i64 = 1_000_000;

/// Most units a single listing may stock
pub const MAX_STOCK: i64 = 100_000;

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password is too long (max {} characters)",
            MAX_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

/// Validate a first or last name
pub fn validate_name(name: &str, label: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("{} is required", label));
    }
    if name.chars().count() > 100 {
        return Err(format!("{} is too long (max 100 characters)", label));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(format!("{} contains invalid characters", label));
    }
    Ok(())
}

/// Validate an optional phone number
pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        if p.trim().is_empty() {
            return Ok(());
        }
        if !PHONE_REGEX.is_match(p.trim()) {
            return Err("Invalid phone number format".to_string());
        }
    }
    Ok(())
}

/// Validate an optional free-text field such as a city or note
pub fn validate_optional_text(value: &Option<String>, label: &str, max: usize) -> Result<(), String> {
    if let Some(v) = value {
        if v.chars().count() > max {
            return Err(format!("{} is too long (max {} characters)", label, max));
        }
    }
    Ok(())
}

/// Validate an invitation code. Lowercase input is accepted and normalized later.
pub fn validate_invite_code(code: &str) -> Result<(), String> {
    let code = code.trim();
    if code.is_empty() {
        return Err("Invitation code is required".to_string());
    }
    if !INVITE_CODE_REGEX.is_match(&code.to_ascii_uppercase()) {
        return Err("Invitation code must be 8 letters or digits".to_string());
    }
    Ok(())
}

pub fn validate_uuid(value: &str, label: &str) -> Result<(), String> {
    if !UUID_REGEX.is_match(value) {
        return Err(format!("{} must be a valid id", label));
    }
    Ok(())
}

/// Validate a points amount for a ledger request
pub fn validate_points(points: i64) -> Result<(), String> {
    if points <= 0 {
        return Err("Points must be a positive integer".to_string());
    }
    if points > MAX_POINTS_PER_REQUEST {
        return Err(format!(
            "Points cannot exceed {} per request",
            MAX_POINTS_PER_REQUEST
        ));
    }
    Ok(())
}

/// Validate a cart quantity. `min` is 1 when adding and 0 when updating.
pub fn validate_quantity(quantity: i64, min: i64) -> Result<(), String> {
    if quantity < min {
        return Err(format!("Quantity must be at least {}", min));
    }
    if quantity > MAX_CART_QUANTITY {
        return Err(format!("Quantity cannot exceed {}", MAX_CART_QUANTITY));
    }
    Ok(())
}

/// Validate a price in minor currency units
pub fn validate_price(price: i64) -> Result<(), String> {
    if price < 0 {
        return Err("Price cannot be negative".to_string());
    }
    if price > MAX_PRICE {
        return Err(format!("Price cannot exceed {}", MAX_PRICE));
    }
    Ok(())
}

/// Validate a per-unit points amount on a product. Zero is allowed.
pub fn validate_product_points(points: i64, label: &str) -> Result<(), String> {
    if points < 0 {
        return Err(format!("{} cannot be negative", label));
    }
    if points > MAX_PRODUCT_POINTS {
        return Err(format!("{} cannot exceed {}", label, MAX_PRODUCT_POINTS));
    }
    Ok(())
}

pub fn validate_stock(stock: i64) -> Result<(), String> {
    if stock < 0 {
        return Err("Stock cannot be negative".to_string());
    }
    if stock > MAX_STOCK {
        return Err(format!("Stock cannot exceed {}", MAX_STOCK));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ana@example.com", true)]
    #[case("  ana.diaz+club@mail.example.org ", true)]
    #[case("", false)]
    #[case("ana@", false)]
    #[case("ana example@x.com", false)]
    #[case("no-at-sign.com", false)]
    fn test_validate_email(#[case] email: &str, #[case] valid: bool) {
        assert_eq!(validate_email(email).is_ok(), valid);
    }

    #[rstest]
    #[case("ABCD1234", true)]
    #[case("abcd1234", true)]
    #[case("ABC123", false)]
    #[case("ABCD-123", false)]
    #[case("", false)]
    fn test_validate_invite_code(#[case] code: &str, #[case] valid: bool) {
        assert_eq!(validate_invite_code(code).is_ok(), valid);
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("swim-bike-run").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ana", "First name").is_ok());
        assert_eq!(
            validate_name("   ", "First name").unwrap_err(),
            "First name is required"
        );
        assert!(validate_name(&"a".repeat(101), "Last name").is_err());
        assert!(validate_name("Ana\u{0007}", "First name").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(&None).is_ok());
        assert!(validate_phone(&Some("+351 912 345 678".to_string())).is_ok());
        assert!(validate_phone(&Some(String::new())).is_ok());
        assert!(validate_phone(&Some("call me".to_string())).is_err());
    }

    #[test]
    fn test_validate_points_and_quantity() {
        assert!(validate_points(1).is_ok());
        assert!(validate_points(0).is_err());
        assert!(validate_points(-10).is_err());
        assert!(validate_points(MAX_POINTS_PER_REQUEST + 1).is_err());

        assert!(validate_quantity(0, 0).is_ok());
        assert!(validate_quantity(0, 1).is_err());
        assert!(validate_quantity(MAX_CART_QUANTITY + 1, 1).is_err());
    }

    #[rstest]
    #[case(0, true)]
    #[case(MAX_PRICE, true)]
    #[case(MAX_PRICE + 1, false)]
    #[case(-1, false)]
    #[case(i64::MAX / 2 + 1, false)]
    fn test_validate_price(#[case] price: i64, #[case] valid: bool) {
        assert_eq!(validate_price(price).is_ok(), valid);
    }

    #[test]
    fn test_validate_product_points_and_stock() {
        assert!(validate_product_points(0, "Points required").is_ok());
        assert!(validate_product_points(MAX_PRODUCT_POINTS, "Points required").is_ok());
        assert_eq!(
            validate_product_points(MAX_PRODUCT_POINTS + 1, "Points discount").unwrap_err(),
            format!("Points discount cannot exceed {}", MAX_PRODUCT_POINTS)
        );
        assert!(validate_product_points(-1, "Points required").is_err());

        assert!(validate_stock(MAX_STOCK).is_ok());
        assert!(validate_stock(MAX_STOCK + 1).is_err());
        assert!(validate_stock(-1).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid(&uuid::Uuid::new_v4().to_string(), "userId").is_ok());
        assert!(validate_uuid("not-a-uuid", "userId").is_err());
    }
}
