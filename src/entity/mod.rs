pub mod device_health;
pub mod sensor_readings;
