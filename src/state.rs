use std::sync::Arc;
use crate::admission::AdmissionController;
use crate::pricing::PricingResolver;
use crate::provider::ChatClient;
// app's shared state

pub struct AppState {
    pub admission: AdmissionController,
    pub provider: ChatClient,
    pub pricing: PricingResolver,
}

pub type SharedState = Arc<AppState>;
