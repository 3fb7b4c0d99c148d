//! Generative-AI collaborators.
//!
//! The domain only sees two opaque functions: photo → breed name, and
//! (breed, age) → recommended vaccines. Breed detection failures are reported
//! to the caller; vaccination advice never fails and degrades to a fixed list.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::errors::ExternalServiceError;

/// Returned whenever no usable advice is available
pub const FALLBACK_VACCINATIONS: [&str; 3] = ["Rabies", "Parvovirus", "Distemper"];

#[async_trait]
pub trait BreedDetector: Send + Sync {
    /// Identify the breed of the dog in `image`
    async fn detect_breed(&self, image: &[u8], mime_type: &str) -> Result<String, ExternalServiceError>;
}

#[async_trait]
pub trait VaccinationAdvisor: Send + Sync {
    /// Ordered list of recommended vaccine names
    async fn recommend_vaccinations(&self, breed: &str, age_in_months: u32) -> Result<Vec<String>, ExternalServiceError>;
}

/// Vaccination advice with a guaranteed answer
#[derive(Clone, Default)]
pub struct VaccinationAdviceService {
    advisor: Option<Arc<dyn VaccinationAdvisor>>,
}

impl VaccinationAdviceService {
    pub fn new(advisor: Option<Arc<dyn VaccinationAdvisor>>) -> Self {
        Self { advisor }
    }

    pub async fn recommend(&self, breed: &str, age_in_months: u32) -> Vec<String> {
        info!("Vaccination advice requested: breed={}, age_in_months={}", breed, age_in_months);

        let Some(advisor) = &self.advisor else {
            warn!("No vaccination advisor configured, using fallback list");
            return fallback();
        };

        match advisor.recommend_vaccinations(breed, age_in_months).await {
            Ok(recommendations) if !recommendations.is_empty() => recommendations,
            Ok(_) => {
                warn!("Vaccination advisor returned no recommendations, using fallback list");
                fallback()
            }
            Err(e) => {
                warn!("Vaccination advice failed, using fallback list: {}", e);
                fallback()
            }
        }
    }
}

fn fallback() -> Vec<String> {
    FALLBACK_VACCINATIONS.iter().map(|name| name.to_string()).collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::FixedAdvisor;
    use super::*;

    #[tokio::test]
    async fn test_advice_passes_through_recommendations() {
        let advisor = FixedAdvisor(Ok(vec!["Leptospirosis".to_string(), "Rabies".to_string()]));
        let service = VaccinationAdviceService::new(Some(Arc::new(advisor)));

        let advice = service.recommend("Beagle", 14).await;

        assert_eq!(advice, vec!["Leptospirosis", "Rabies"]);
    }

    #[tokio::test]
    async fn test_advice_failure_falls_back() {
        let advisor = FixedAdvisor(Err(ExternalServiceError::InvalidResponse {
            service: "vaccination advice",
            message: "not JSON".to_string(),
        }));
        let service = VaccinationAdviceService::new(Some(Arc::new(advisor)));

        assert_eq!(service.recommend("Beagle", 14).await, FALLBACK_VACCINATIONS.to_vec());
    }

    #[tokio::test]
    async fn test_advice_without_advisor_or_answer_falls_back() {
        assert_eq!(
            VaccinationAdviceService::default().recommend("Pug", 3).await,
            FALLBACK_VACCINATIONS.to_vec()
        );

        let empty = VaccinationAdviceService::new(Some(Arc::new(FixedAdvisor(Ok(Vec::new())))));
        assert_eq!(empty.recommend("Pug", 3).await.len(), 3);
    }
}
