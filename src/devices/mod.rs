mod service;

pub use service::{
    AddActuatorForm, AddDeviceForm, AddSensorForm, Choice, DeviceService, Field, FieldErrors,
    LimitInputs, Submission, FILL_ALL_FIELDS, INVALID_DEVICE_NAME, INVALID_INPUT,
    SELECT_ACTUATOR_MODEL, SELECT_ACTUATOR_TYPE, SELECT_DEVICE_TYPE, SELECT_SENSOR_MODEL,
    SELECT_SENSOR_TYPE,
};
