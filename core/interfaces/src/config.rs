use serde::de::DeserializeOwned;
use serde::Serialize;

/// Any object that in the program that is associated a configuration value
/// in the global configuration file.
pub trait ConfigConsumer {
    /// The top-level key in the config file that should be used for this object.
    const KEY: &'static str;

    /// The type which is expected for this configuration object.
    type Config: Send + Sync + Serialize + DeserializeOwned + Default;
}
