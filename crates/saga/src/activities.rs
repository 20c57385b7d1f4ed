//! The six booking activities, backed by reservation services.

use std::sync::Arc;

use common::BookingId;
use engine::{ActivityContext, ActivityError, ActivityRegistry};

use crate::branch::{BRANCHES, Branch, TripBranch};
use crate::services::ReservationService;

/// The reservation services of one travel agency, exposed as activities.
#[derive(Clone)]
pub struct TravelAgency {
    car: Arc<dyn ReservationService>,
    hotel: Arc<dyn ReservationService>,
    flight: Arc<dyn ReservationService>,
}

impl TravelAgency {
    pub fn new(
        car: impl ReservationService + 'static,
        hotel: impl ReservationService + 'static,
        flight: impl ReservationService + 'static,
    ) -> Self {
        Self {
            car: Arc::new(car),
            hotel: Arc::new(hotel),
            flight: Arc::new(flight),
        }
    }

    pub fn service(&self, branch: TripBranch) -> &Arc<dyn ReservationService> {
        match branch {
            TripBranch::Car => &self.car,
            TripBranch::Hotel => &self.hotel,
            TripBranch::Flight => &self.flight,
        }
    }

    /// Builds a registry serving every booking and cancellation activity.
    pub fn registry(&self) -> ActivityRegistry {
        let mut registry = ActivityRegistry::new();
        for branch in BRANCHES {
            self.register_branch(&mut registry, branch);
        }
        registry
    }

    fn register_branch(&self, registry: &mut ActivityRegistry, branch: Branch) {
        let service = Arc::clone(self.service(branch.kind));
        registry.register(branch.book, move |ctx: ActivityContext, (user_id,): (String,)| {
            let service = Arc::clone(&service);
            async move {
                let booking_id = service
                    .book(&user_id)
                    .await
                    .map_err(|e| ActivityError::application(e.to_string()))?;
                tracing::info!(
                    run_id = %ctx.run_id,
                    attempt = ctx.attempt,
                    %booking_id,
                    user_id = %user_id,
                    "Booked a {}",
                    branch.kind
                );
                Ok(String::from(booking_id))
            }
        });

        let service = Arc::clone(self.service(branch.kind));
        registry.register(
            branch.cancel,
            move |ctx: ActivityContext, (user_id, booking_id): (String, String)| {
                let service = Arc::clone(&service);
                async move {
                    let booking_id = BookingId::new(booking_id);
                    service
                        .cancel(&user_id, &booking_id)
                        .await
                        .map_err(|e| ActivityError::application(e.to_string()))?;
                    tracing::info!(
                        run_id = %ctx.run_id,
                        attempt = ctx.attempt,
                        %booking_id,
                        user_id = %user_id,
                        "Canceled a {} booking",
                        branch.kind
                    );
                    Ok(())
                }
            },
        );
    }
}

impl std::fmt::Debug for TravelAgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TravelAgency").finish_non_exhaustive()
    }
}
