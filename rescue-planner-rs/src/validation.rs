//! Request validation
//!
//! This is the only stage whose failure is reported to the caller. Checks run
//! in a fixed order and the first violation wins.

use crate::error::{ValidationError, MAX_ADDITIONAL_INFO, MAX_ITEMS};
use crate::models::RescuePlanRequest;

pub fn validate(request: &RescuePlanRequest) -> Result<(), ValidationError> {
    if request.items.is_empty() {
        return Err(ValidationError::NoItems);
    }
    if request.items.len() > MAX_ITEMS {
        return Err(ValidationError::TooManyItems {
            count: request.items.len(),
            max: MAX_ITEMS,
        });
    }

    for (index, item) in request.items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(ValidationError::BlankItemName { index });
        }
        if item.quantity < 1 {
            return Err(ValidationError::NonPositiveQuantity {
                index,
                quantity: item.quantity,
            });
        }
        if item.location.trim().is_empty() {
            return Err(ValidationError::BlankLocation { index });
        }
    }

    let env = &request.environment;
    if env.exits < 1 {
        return Err(ValidationError::NoExits);
    }
    if let Some(occupancy) = env.occupancy.filter(|o| *o < 0) {
        return Err(ValidationError::NegativeOccupancy(occupancy));
    }

    if let Some(info) = &request.additional_info {
        let length = info.chars().count();
        if length > MAX_ADDITIONAL_INFO {
            return Err(ValidationError::AdditionalInfoTooLong {
                length,
                max: MAX_ADDITIONAL_INFO,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn request() -> RescuePlanRequest {
        RescuePlanRequest {
            items: vec![Item {
                name: "沙发".to_string(),
                material: Material::Fabric,
                quantity: 1,
                location: "客厅".to_string(),
                condition: None,
                flammability: None,
                toxicity: None,
            }],
            environment: Environment {
                env_type: EnvironmentType::Indoor,
                area: AreaType::Residential,
                ventilation: Ventilation::Good,
                exits: 2,
                occupancy: Some(3),
                floor: None,
                building_type: None,
                special_conditions: None,
                fire_safety_equipment: None,
            },
            additional_info: None,
            urgency_level: "中".to_string(),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert_eq!(validate(&request()), Ok(()));
    }

    #[test]
    fn test_item_count_limits() {
        let mut req = request();
        req.items.clear();
        assert_eq!(validate(&req), Err(ValidationError::NoItems));

        let item = request().items.remove(0);
        req.items = vec![item; MAX_ITEMS + 1];
        assert_eq!(
            validate(&req),
            Err(ValidationError::TooManyItems { count: 51, max: 50 })
        );

        req.items.truncate(MAX_ITEMS);
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn test_item_fields() {
        let mut req = request();
        req.items[0].quantity = 0;
        assert_eq!(
            validate(&req),
            Err(ValidationError::NonPositiveQuantity { index: 0, quantity: 0 })
        );

        let mut req = request();
        req.items[0].name = "   ".to_string();
        assert_eq!(validate(&req), Err(ValidationError::BlankItemName { index: 0 }));

        let mut req = request();
        req.items[0].location = String::new();
        assert_eq!(validate(&req), Err(ValidationError::BlankLocation { index: 0 }));
    }

    #[test]
    fn test_environment_fields() {
        let mut req = request();
        req.environment.exits = 0;
        assert_eq!(validate(&req), Err(ValidationError::NoExits));

        let mut req = request();
        req.environment.occupancy = Some(-1);
        assert_eq!(validate(&req), Err(ValidationError::NegativeOccupancy(-1)));
    }

    #[test]
    fn test_additional_info_counts_characters() {
        let mut req = request();
        req.additional_info = Some("火".repeat(MAX_ADDITIONAL_INFO));
        assert!(validate(&req).is_ok());

        req.additional_info = Some("火".repeat(MAX_ADDITIONAL_INFO + 1));
        assert!(matches!(
            validate(&req),
            Err(ValidationError::AdditionalInfoTooLong { length: 1001, .. })
        ));
    }
}
