use serde::{Deserialize, Serialize};

use crate::error::RealtyError;

/// What the user is looking for. Captured once at the start of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub location: String,
    #[serde(default = "default_property_type")]
    pub property_type: String,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default = "default_rent_frequency")]
    pub rent_frequency: String,
    #[serde(default)]
    pub additional_requirements: Option<String>,
}

fn default_property_type() -> String {
    "apartment".to_string()
}

fn default_rent_frequency() -> String {
    "monthly".to_string()
}

impl SearchCriteria {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            property_type: default_property_type(),
            bedrooms: None,
            bathrooms: None,
            max_price: None,
            rent_frequency: default_rent_frequency(),
            additional_requirements: None,
        }
    }

    pub fn validate(&self) -> Result<(), RealtyError> {
        if self.location.trim().is_empty() {
            return Err(RealtyError::Config(
                "search criteria must include a location".to_string(),
            ));
        }
        if self.property_type.trim().is_empty() {
            return Err(RealtyError::Config(
                "search criteria must include a property type".to_string(),
            ));
        }
        Ok(())
    }

    /// Natural-language query handed to the research crew, e.g.
    /// `"2 bedroom apartment in Lagos under 500000 (monthly rent)"`.
    pub fn search_query(&self) -> String {
        let bedrooms = self.bedrooms.map(|b| b.to_string()).unwrap_or_default();
        let mut query = format!(
            "{} bedroom {} in {}",
            bedrooms, self.property_type, self.location
        );
        if let Some(price) = self.max_price {
            query.push_str(&format!(" under {}", price));
        }
        query.push_str(&format!(" ({} rent)", self.rent_frequency));
        if let Some(extra) = self.additional_requirements.as_deref() {
            if !extra.trim().is_empty() {
                query.push_str(&format!(". Requirements: {}", extra.trim()));
            }
        }
        query.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_full() {
        let criteria = SearchCriteria {
            bedrooms: Some(2),
            max_price: Some(500000.0),
            ..SearchCriteria::new("Lekki, Lagos")
        };
        assert_eq!(
            criteria.search_query(),
            "2 bedroom apartment in Lekki, Lagos under 500000 (monthly rent)"
        );
    }

    #[test]
    fn test_search_query_without_bedrooms_is_trimmed() {
        let criteria = SearchCriteria {
            property_type: "house".to_string(),
            rent_frequency: "yearly".to_string(),
            ..SearchCriteria::new("Austin")
        };
        assert_eq!(criteria.search_query(), "bedroom house in Austin (yearly rent)");
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let criteria: SearchCriteria =
            serde_json::from_str(r#"{"location": "Nairobi", "bedrooms": 3}"#).unwrap();
        assert_eq!(criteria.property_type, "apartment");
        assert_eq!(criteria.rent_frequency, "monthly");
        assert_eq!(criteria.bedrooms, Some(3));
        assert!(criteria.max_price.is_none());
    }

    #[test]
    fn test_validate_rejects_blank_location() {
        assert!(SearchCriteria::new("  ").validate().is_err());
        assert!(SearchCriteria::new("Accra").validate().is_ok());
    }
}
