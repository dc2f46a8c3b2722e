//! Retransmission timeout calculation (RFC 4960 Section 6.3.1).

use std::time::Duration;

const RTO_ALPHA: f64 = 0.125;
const RTO_BETA: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct RtoManager {
    srtt: Option<f64>,
    rttvar: f64,
    rto: f64,
    min: f64,
    max: f64,
}

impl RtoManager {
    pub fn new(initial: Duration, min: Duration, max: Duration) -> Self {
        Self {
            srtt: None,
            rttvar: 0.0,
            rto: initial.as_secs_f64() * 1000.0,
            min: min.as_secs_f64() * 1000.0,
            max: max.as_secs_f64() * 1000.0,
        }
    }

    /// Feeds one RTT measurement and returns the new RTO.
    pub fn set_new_rtt(&mut self, rtt: Duration) -> Duration {
        let r = rtt.as_secs_f64() * 1000.0;
        match self.srtt {
            None => {
                self.srtt = Some(r);
                self.rttvar = r / 2.0;
            }
            Some(srtt) => {
                self.rttvar = (1.0 - RTO_BETA) * self.rttvar + RTO_BETA * (srtt - r).abs();
                self.srtt = Some((1.0 - RTO_ALPHA) * srtt + RTO_ALPHA * r);
            }
        }
        let srtt = self.srtt.unwrap_or(r);
        self.rto = (srtt + 4.0 * self.rttvar).clamp(self.min, self.max);
        self.rto()
    }

    /// Doubles the RTO after a timer expiry, up to the maximum.
    pub fn backoff(&mut self) -> Duration {
        self.rto = (self.rto * 2.0).min(self.max);
        self.rto()
    }

    pub fn rto(&self) -> Duration {
        Duration::from_secs_f64(self.rto / 1000.0)
    }

    pub fn srtt(&self) -> Option<Duration> {
        self.srtt.map(|s| Duration::from_secs_f64(s / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RtoManager {
        RtoManager::new(
            Duration::from_secs(3),
            Duration::from_secs(1),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_initial_rto() {
        assert_eq!(manager().rto(), Duration::from_secs(3));
        assert!(manager().srtt().is_none());
    }

    #[test]
    fn test_first_measurement() {
        let mut rto = manager();
        // 2s + 4 * 1s
        assert_eq!(rto.set_new_rtt(Duration::from_secs(2)), Duration::from_secs(6));
        assert_eq!(rto.srtt(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_clamped_to_min() {
        let mut rto = manager();
        assert_eq!(
            rto.set_new_rtt(Duration::from_millis(10)),
            Duration::from_secs(1)
        );
        assert_eq!(
            rto.set_new_rtt(Duration::from_millis(10)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_backoff_capped() {
        let mut rto = manager();
        assert_eq!(rto.backoff(), Duration::from_secs(6));
        for _ in 0..10 {
            rto.backoff();
        }
        assert_eq!(rto.rto(), Duration::from_secs(60));
    }
}
