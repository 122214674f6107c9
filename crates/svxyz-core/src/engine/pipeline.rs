use super::config::{FilterConfig, FilterSpec};
use super::quantity::Quantity;
use crate::core::models::frame::Frame;

/// The enabled filters of a configuration, evaluated as a logical AND.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterPipeline {
    filters: Vec<(Quantity, FilterSpec)>,
}

impl FilterPipeline {
    pub fn new(config: &FilterConfig) -> Self {
        let filters = config
            .specs()
            .filter(|(_, spec)| spec.is_active())
            .map(|(q, spec)| (q, *spec))
            .collect();
        Self { filters }
    }

    pub fn is_identity(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &(Quantity, FilterSpec)> {
        self.filters.iter()
    }

    pub fn passes(&self, frame: &Frame) -> bool {
        self.first_rejection(frame).is_none()
    }

    /// The first filter, in configuration order, that the frame fails.
    ///
    /// A frame without the quantity an active filter needs fails that filter.
    pub fn first_rejection(&self, frame: &Frame) -> Option<Quantity> {
        self.filters
            .iter()
            .find(|(quantity, spec)| {
                !quantity
                    .measure(frame)
                    .is_some_and(|value| spec.contains(value))
            })
            .map(|(quantity, _)| *quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::voigt::{Component, EV_A3_TO_GPA, Voigt};
    use nalgebra::Matrix3;

    fn frame_with_energy(index: usize, energy: f64) -> Frame {
        Frame {
            index,
            energy: Some(energy),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_identity() {
        let pipeline = FilterPipeline::new(&FilterConfig::default());
        assert!(pipeline.is_identity());
        assert!(pipeline.passes(&Frame::default()));
        assert!(pipeline.passes(&frame_with_energy(3, 1e9)));
    }

    #[test]
    fn enabled_spec_without_bounds_is_ignored() {
        let mut config = FilterConfig::default();
        config.energy.enabled = true;
        let pipeline = FilterPipeline::new(&config);
        assert!(pipeline.is_identity());
        assert!(pipeline.passes(&Frame::default()));
    }

    #[test]
    fn energy_window_keeps_only_frames_inside() {
        let mut config = FilterConfig::default();
        config.energy = FilterSpec::range(Some(-5.0), Some(-3.0));
        let pipeline = FilterPipeline::new(&config);

        let kept: Vec<f64> = [-6.0, -4.0, -2.0]
            .into_iter()
            .enumerate()
            .map(|(i, e)| frame_with_energy(i, e))
            .filter(|f| pipeline.passes(f))
            .filter_map(|f| f.energy)
            .collect();
        assert_eq!(kept, vec![-4.0]);
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut config = FilterConfig::default();
        config.energy = FilterSpec::range(Some(-5.0), Some(-3.0));
        let pipeline = FilterPipeline::new(&config);

        assert!(pipeline.passes(&frame_with_energy(0, -5.0)));
        assert!(pipeline.passes(&frame_with_energy(0, -3.0)));
    }

    #[test]
    fn frame_filter_uses_source_index() {
        let mut config = FilterConfig::default();
        config.frame = FilterSpec::range(Some(2.0), Some(3.0));
        let pipeline = FilterPipeline::new(&config);

        let kept: Vec<usize> = (0..6)
            .map(|i| frame_with_energy(i, 0.0))
            .filter(|f| pipeline.passes(f))
            .map(|f| f.index)
            .collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[test]
    fn missing_quantity_fails_the_filter() {
        let mut config = FilterConfig::default();
        config.volume = FilterSpec::range(None, Some(100.0));
        let pipeline = FilterPipeline::new(&config);

        let frame = frame_with_energy(0, -1.0);
        assert!(!pipeline.passes(&frame));
        assert_eq!(pipeline.first_rejection(&frame), Some(Quantity::Volume));
    }

    #[test]
    fn first_rejection_follows_configuration_order() {
        let mut config = FilterConfig::default();
        config.energy = FilterSpec::range(Some(0.0), None);
        config.pressure = FilterSpec::range(Some(0.0), Some(1.0));
        config.stress_xx = FilterSpec::range(None, Some(0.5));
        let pipeline = FilterPipeline::new(&config);
        assert_eq!(pipeline.active().count(), 3);

        let compressed = Frame {
            energy: Some(1.0),
            cell: Some(Matrix3::identity()),
            stress: Some(Voigt::new([-2.0, -2.0, -2.0, 0.0, 0.0, 0.0]) * (1.0 / EV_A3_TO_GPA)),
            ..Default::default()
        };
        assert_eq!(
            pipeline.first_rejection(&compressed),
            Some(Quantity::Pressure)
        );

        let mut relaxed = compressed.clone();
        relaxed.stress = Some(Voigt::new([-0.9, 0.0, 0.0, 0.0, 0.0, 0.0]) * (1.0 / EV_A3_TO_GPA));
        assert_eq!(
            pipeline.first_rejection(&relaxed),
            Some(Quantity::Stress(Component::Xx))
        );

        relaxed.stress = Some(Voigt::new([-0.3, -0.3, -0.3, 0.0, 0.0, 0.0]) * (1.0 / EV_A3_TO_GPA));
        assert!(pipeline.passes(&relaxed));
    }
}
