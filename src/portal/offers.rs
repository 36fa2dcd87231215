//! Current showroom offers.

use serde::{Deserialize, Serialize};

/// A promotional offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub title: String,
    pub description: String,
    /// Which model the offer applies to, as shown to the customer.
    pub model: String,
    /// Icon name from the page's icon set.
    pub icon: String,
}

impl Offer {
    fn new(title: &str, description: &str, model: &str, icon: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            model: model.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// The offers shown in the offers dialog, in display order.
#[must_use]
pub fn default_offers() -> Vec<Offer> {
    vec![
        Offer::new(
            "Monsoon Bonanza",
            "Flat ₹50,000 discount + accessories worth ₹10,000",
            "On the Tata Harrier",
            "gift",
        ),
        Offer::new(
            "EV Power Pack",
            "Free home charging station installation",
            "On the Tata Nexon EV",
            "zap",
        ),
        Offer::new(
            "Family Adventure Upgrade",
            "Complimentary roof rack and floor mats",
            "On the Tata Safari",
            "mountain",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_offers_in_order() {
        let offers = default_offers();
        let titles: Vec<_> = offers.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Monsoon Bonanza", "EV Power Pack", "Family Adventure Upgrade"]
        );
        assert_eq!(offers[1].icon, "zap");
    }
}
