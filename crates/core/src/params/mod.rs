use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    config::{validate_positive, validate_volume, AnalysisConfig, VisualConfig, VisualMode},
    Result, VisualiserError,
};

/// A single setting that changed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "setting", content = "value", rename_all = "snake_case")]
pub enum ParameterChange {
    Resolution(u32),
    Smoothing(f32),
    Sensitivity(f32),
    LineWidth(f32),
    Volume(f32),
    Mode(VisualMode),
}

impl ParameterChange {
    /// Whether the analyser must be reconfigured for this change. Switching
    /// to a mode without a drawing strategy leaves it alone.
    pub fn affects_analysis(&self) -> bool {
        match self {
            Self::Resolution(_) | Self::Smoothing(_) => true,
            Self::Mode(mode) => mode.is_drawable(),
            Self::Sensitivity(_) | Self::LineWidth(_) | Self::Volume(_) => false,
        }
    }
}

type Listener = Box<dyn FnMut(&ParameterChange)>;

/// Current user-tunable settings. Setters validate the raw control value and
/// notify subscribers synchronously when the value actually changes.
pub struct ParameterStore {
    analysis: AnalysisConfig,
    visual: VisualConfig,
    listeners: Vec<Listener>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(AnalysisConfig::default(), VisualConfig::default())
    }
}

impl ParameterStore {
    pub fn new(analysis: AnalysisConfig, visual: VisualConfig) -> Self {
        Self {
            analysis,
            visual,
            listeners: Vec::new(),
        }
    }

    pub fn analysis(&self) -> AnalysisConfig {
        self.analysis
    }

    pub fn visual(&self) -> &VisualConfig {
        &self.visual
    }

    pub fn mode(&self) -> VisualMode {
        self.visual.mode
    }

    /// Registers an observer called after every effective change.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&ParameterChange) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn set_resolution(&mut self, resolution: u32) -> Result<Option<ParameterChange>> {
        AnalysisConfig::new(resolution, self.analysis.smoothing)?;
        self.update(
            self.analysis.resolution != resolution,
            ParameterChange::Resolution(resolution),
        )
    }

    pub fn set_smoothing(&mut self, smoothing: f32) -> Result<Option<ParameterChange>> {
        AnalysisConfig::new(self.analysis.resolution, smoothing)?;
        self.update(
            self.analysis.smoothing != smoothing,
            ParameterChange::Smoothing(smoothing),
        )
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<Option<ParameterChange>> {
        validate_positive("sensitivity", sensitivity)?;
        self.update(
            self.visual.sensitivity != sensitivity,
            ParameterChange::Sensitivity(sensitivity),
        )
    }

    pub fn set_line_width(&mut self, line_width: f32) -> Result<Option<ParameterChange>> {
        validate_positive("line width", line_width)?;
        self.update(
            self.visual.line_width != line_width,
            ParameterChange::LineWidth(line_width),
        )
    }

    /// Takes the volume control's integer percentage.
    pub fn set_volume_percent(&mut self, percent: u32) -> Result<Option<ParameterChange>> {
        if percent > 100 {
            return Err(VisualiserError::invalid(format!(
                "volume {percent}% is outside 0..=100"
            )));
        }
        self.set_volume(percent as f32 / 100.0)
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<Option<ParameterChange>> {
        validate_volume(volume)?;
        self.update(self.visual.volume != volume, ParameterChange::Volume(volume))
    }

    /// Selects a mode; all others are implicitly deselected.
    pub fn set_mode(&mut self, mode: VisualMode) -> Result<Option<ParameterChange>> {
        self.update(self.visual.mode != mode, ParameterChange::Mode(mode))
    }

    pub fn set_mode_name(&mut self, name: &str) -> Result<Option<ParameterChange>> {
        self.set_mode(name.parse()?)
    }

    pub fn smoothing_label(&self) -> String {
        format!("{:.2}", self.analysis.smoothing)
    }

    pub fn volume_label(&self) -> String {
        format!("{}%", (self.visual.volume * 100.0).round() as u32)
    }

    pub fn sensitivity_label(&self) -> String {
        self.visual.sensitivity.to_string()
    }

    pub fn line_width_label(&self) -> String {
        self.visual.line_width.to_string()
    }

    fn update(
        &mut self,
        changed: bool,
        change: ParameterChange,
    ) -> Result<Option<ParameterChange>> {
        if !changed {
            return Ok(None);
        }

        match change {
            ParameterChange::Resolution(value) => self.analysis.resolution = value,
            ParameterChange::Smoothing(value) => self.analysis.smoothing = value,
            ParameterChange::Sensitivity(value) => self.visual.sensitivity = value,
            ParameterChange::LineWidth(value) => self.visual.line_width = value,
            ParameterChange::Volume(value) => self.visual.volume = value,
            ParameterChange::Mode(mode) => self.visual.mode = mode,
        }

        for listener in &mut self.listeners {
            listener(&change);
        }
        Ok(Some(change))
    }
}

impl fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterStore")
            .field("analysis", &self.analysis)
            .field("visual", &self.visual)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn notifies_only_on_effective_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = ParameterStore::default();
        let sink = Rc::clone(&seen);
        store.subscribe(move |change| sink.borrow_mut().push(*change));

        assert_eq!(store.set_sensitivity(1.0).unwrap(), None);
        assert_eq!(
            store.set_sensitivity(2.5).unwrap(),
            Some(ParameterChange::Sensitivity(2.5))
        );
        assert_eq!(store.set_resolution(4096).unwrap(), None);
        store.set_resolution(1024).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                ParameterChange::Sensitivity(2.5),
                ParameterChange::Resolution(1024)
            ]
        );
    }

    #[test]
    fn invalid_values_leave_state_unchanged() {
        let mut store = ParameterStore::default();

        assert!(store.set_resolution(3000).is_err());
        assert!(store.set_smoothing(-0.1).is_err());
        assert!(store.set_sensitivity(0.0).is_err());
        assert!(store.set_line_width(f32::NAN).is_err());
        assert!(store.set_volume_percent(101).is_err());
        assert!(store.set_mode_name("bars").is_err());

        assert_eq!(store.analysis(), AnalysisConfig::default());
        assert_eq!(*store.visual(), VisualConfig::default());
    }

    #[test]
    fn volume_percent_is_scaled() {
        let mut store = ParameterStore::default();
        store.set_volume_percent(35).unwrap();
        assert!((store.visual().volume - 0.35).abs() < f32::EPSILON);
        assert_eq!(store.volume_label(), "35%");
    }

    #[test]
    fn modes_are_mutually_exclusive() {
        let mut store = ParameterStore::default();
        store.set_mode_name("spectrum").unwrap();
        assert_eq!(store.mode(), VisualMode::Spectrum);

        let analysis = store.analysis();
        store.set_mode_name("Spectrogram").unwrap();
        assert_eq!(store.mode(), VisualMode::Spectrogram);
        assert_eq!(store.analysis(), analysis);
    }

    #[test]
    fn labels_match_control_formatting() {
        let mut store = ParameterStore::default();
        store.set_smoothing(0.8).unwrap();
        store.set_line_width(2.5).unwrap();
        assert_eq!(store.smoothing_label(), "0.80");
        assert_eq!(store.line_width_label(), "2.5");
        assert_eq!(store.sensitivity_label(), "1");
    }

    #[test]
    fn only_analyser_inputs_reconfigure() {
        assert!(ParameterChange::Resolution(1024).affects_analysis());
        assert!(ParameterChange::Smoothing(0.5).affects_analysis());
        assert!(ParameterChange::Mode(VisualMode::Spectrum).affects_analysis());
        assert!(!ParameterChange::Mode(VisualMode::Spectrogram).affects_analysis());
        assert!(!ParameterChange::Volume(0.3).affects_analysis());
        assert!(!ParameterChange::LineWidth(4.0).affects_analysis());
    }
}
