use std::time::Duration;

/// Politeness delay between calls to the external services.
///
/// This is a fixed sleep that ignores observed load; swapping in a smarter throttle
/// only requires another variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// No delay at all
    #[default]
    None,
    /// Sleep for a fixed duration
    Fixed(Duration),
}

impl Pacing {
    /// Fixed delay in milliseconds; zero disables pacing
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            Pacing::None
        } else {
            Pacing::Fixed(Duration::from_millis(millis))
        }
    }

    pub async fn pause(&self) {
        if let Pacing::Fixed(delay) = self {
            tokio::time::sleep(*delay).await;
        }
    }
}
