mod service;

pub use service::{
    ActuatorControls, ActuatorValue, ControlPhase, ControlTiming, ControlView, DispatchFailure,
    DispatchOutcome, SyncReport, LOADING, MISSING_SENSOR, NO_CHANGE, SUCCESS,
};
