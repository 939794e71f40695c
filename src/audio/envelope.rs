//! Gain automation timelines
//!
//! An envelope is a list of parameter events in the audio clock's time base
//! (seconds). Backends replay the events onto the host's sample-accurate
//! parameter scheduling; `value_at` evaluates the same curve natively.

/// One scheduled change to a gain parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    /// Jump to `value` at `time`
    Set { value: f32, time: f64 },
    /// Ramp linearly from the previous event to `value`, arriving at `time`
    Linear { value: f32, time: f64 },
    /// Ramp exponentially from the previous event to `value`, arriving at `time`
    Exponential { value: f32, time: f64 },
}

impl Automation {
    pub fn time(&self) -> f64 {
        match *self {
            Automation::Set { time, .. }
            | Automation::Linear { time, .. }
            | Automation::Exponential { time, .. } => time,
        }
    }

    pub fn value(&self) -> f32 {
        match *self {
            Automation::Set { value, .. }
            | Automation::Linear { value, .. }
            | Automation::Exponential { value, .. } => value,
        }
    }
}

/// Ordered automation events for one gain parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainEnvelope {
    events: Vec<Automation>,
}

impl GainEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Events must be pushed in non-decreasing time order.
    pub fn push(&mut self, event: Automation) {
        debug_assert!(
            self.events.last().is_none_or(|last| last.time() <= event.time()),
            "automation events out of order"
        );
        self.events.push(event);
    }

    pub fn set(mut self, value: f32, time: f64) -> Self {
        self.push(Automation::Set { value, time });
        self
    }

    pub fn linear_to(mut self, value: f32, time: f64) -> Self {
        self.push(Automation::Linear { value, time });
        self
    }

    pub fn exponential_to(mut self, value: f32, time: f64) -> Self {
        self.push(Automation::Exponential { value, time });
        self
    }

    /// Click-free onset: hold `floor` at `start`, then rise exponentially to
    /// `target` over `duration`.
    ///
    /// Exponential ramps cannot start from zero, so a non-positive floor is
    /// raised to a tiny positive value.
    pub fn attack(floor: f32, target: f32, start: f64, duration: f64) -> Self {
        let floor = if floor > 0.0 { floor } else { f32::MIN_POSITIVE };
        Self::new()
            .set(floor, start)
            .exponential_to(target.max(floor), start + duration.max(0.0))
    }

    /// Linear fade from silence to `full`, starting at `start`
    pub fn fade_in(full: f32, start: f64, window: f64) -> Self {
        Self::new().set(0.0, start).linear_to(full, start + window.max(0.0))
    }

    /// Linear fade from `full` to silence that completes exactly at `end`
    pub fn fade_out(full: f32, end: f64, window: f64) -> Self {
        let window = window.max(0.0);
        Self::new().set(full, end - window).linear_to(0.0, end)
    }

    /// Append every event of `other`
    pub fn then(mut self, other: GainEnvelope) -> Self {
        for event in other.events {
            self.push(event);
        }
        self
    }

    pub fn events(&self) -> &[Automation] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn start_time(&self) -> Option<f64> {
        self.events.first().map(Automation::time)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(Automation::time)
    }

    /// Gain at `time`, given the parameter held `initial` before the first event.
    ///
    /// Exponential segments whose endpoints are not both positive hold the
    /// previous value until the segment ends, as Web Audio does.
    pub fn value_at(&self, time: f64, initial: f32) -> f32 {
        let mut value = initial;
        let mut prev_time: Option<f64> = None;

        for event in &self.events {
            let end = event.time();
            if time < end {
                let Some(start) = prev_time else {
                    return value;
                };
                let span = end - start;
                if span <= 0.0 {
                    return value;
                }
                let t = ((time - start) / span) as f32;
                return match *event {
                    Automation::Set { .. } => value,
                    Automation::Linear { value: target, .. } => value + (target - value) * t,
                    Automation::Exponential { value: target, .. } => {
                        if value > 0.0 && target > 0.0 {
                            value * (target / value).powf(t)
                        } else {
                            value
                        }
                    }
                };
            }
            value = event.value();
            prev_time = Some(end);
        }

        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_rises_exponentially() {
        let env = GainEnvelope::attack(1e-4, 0.4, 2.0, 0.03);
        assert_eq!(env.events().len(), 2);
        assert_eq!(env.value_at(1.0, 0.0), 0.0);
        assert!((env.value_at(2.0, 0.0) - 1e-4).abs() < 1e-9);
        assert!((env.value_at(2.03, 0.0) - 0.4).abs() < 1e-6);

        // Geometric midpoint, well below the linear midpoint
        let mid = env.value_at(2.015, 0.0);
        assert!((mid - (1e-4f32 * 0.4).sqrt()).abs() < 1e-4);
        assert!(mid < 0.2);
    }

    #[test]
    fn test_attack_floor_is_positive() {
        let env = GainEnvelope::attack(0.0, 1.0, 0.0, 0.1);
        assert!(env.events()[0].value() > 0.0);
    }

    #[test]
    fn test_fade_in_then_out() {
        let env = GainEnvelope::fade_in(0.8, 10.0, 3.0).then(GainEnvelope::fade_out(0.8, 40.0, 3.0));

        assert_eq!(env.value_at(10.0, 0.0), 0.0);
        assert!((env.value_at(11.5, 0.0) - 0.4).abs() < 1e-6);
        assert!((env.value_at(13.0, 0.0) - 0.8).abs() < 1e-6);
        assert!((env.value_at(25.0, 0.0) - 0.8).abs() < 1e-6);
        assert!((env.value_at(38.5, 0.0) - 0.4).abs() < 1e-6);
        assert_eq!(env.value_at(40.0, 0.0), 0.0);
        assert_eq!(env.end_time(), Some(40.0));
    }

    #[test]
    fn test_exponential_from_zero_holds() {
        let env = GainEnvelope::new().set(0.0, 0.0).exponential_to(1.0, 1.0);
        assert_eq!(env.value_at(0.5, 0.0), 0.0);
        assert_eq!(env.value_at(1.0, 0.0), 1.0);
    }
}
