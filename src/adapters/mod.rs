//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                   |
//! |-------------|---------------------|-------------------------------|
//! | `log_sink`  | LogSink             | CSV files on the data volume  |
//! | `storage`   | -                   | FAT data partition            |
//! | `time`      | Clock, TimeSync     | esp_timer, RTC, SNTP          |
//! | `upload`    | UploadPort          | HTTPS collector               |
//! | `web`       | WebEndpoint         | ESP-IDF HTTP server           |
//! | `wifi`      | NetworkGate         | ESP-IDF WiFi STA/AP           |
//! | `device_id` | -                   | eFuse MAC                     |

pub mod device_id;
pub mod log_sink;
pub mod storage;
pub mod time;
pub mod upload;
pub mod web;
pub mod wifi;
