//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two `Money`
/// values with the same amount and currency are the same money. To "modify" a
/// value object, build a new one.
///
/// ```ignore
/// let a = Money::new(dec!(100), Currency::new("USD")?);
/// let b = Money::new(dec!(100), Currency::new("USD")?);
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
