//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                     | Connects to                |
//! |-------------|--------------------------------|----------------------------|
//! | `hardware`  | ClockPort, BatteryPort         | ESP32 timer, ADC1          |
//! |             | ActuatorPort                   | relay + LED GPIO           |
//! |             | PowerPort, DeviceInfoPort      | deep sleep, eFuse MAC      |
//! | `mqtt`      | PublishPort                    | ESP-IDF MQTT client        |
//! | `log_sink`  | EventSink                      | Serial log output          |
//! | `time`      | ClockPort                      | ESP32 system timer         |
//! | `wifi`      | ConnectivityPort               | ESP-IDF WiFi STA           |
//! | `device_id` | —                              | station name + MAC string  |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub mod wifi;
