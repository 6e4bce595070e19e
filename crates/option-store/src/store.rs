//! Option Store Implementation

use crate::error::StoreError;
use crate::table::{OptionDef, OptionId, OptionKind, OptionValue, OPTIONS, OPTION_COUNT};
use crate::CLOUD_TOKEN_LEN;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Upper bound on lines parsed from one file, guards against runaway files
const MAX_LOAD_LINES: usize = OPTION_COUNT + 1;

/// Outcome of a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Whether the option file existed
    pub found: bool,
    /// Lines parsed
    pub lines: usize,
    /// Lines that updated a known option
    pub applied: usize,
}

/// What startup did with the option file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// No file existed, defaults were written
    Initialized,
    /// File loaded, firmware version unchanged
    Loaded,
    /// File loaded from an older firmware. The loaded values are kept even
    /// when re-saving fails; `saved` tells whether the file was rewritten.
    Migrated { from: u32, saved: bool },
}

/// Static network configuration taken from the options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIp {
    pub address: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
}

/// Typed option table backed by a `name:value` text file.
///
/// Lookup by name is a linear scan over the compiled table; the table is
/// small and the scan is the intended cost.
pub struct OptionStore {
    /// Backing file
    path: PathBuf,
    /// Values in table order
    values: [OptionValue; OPTION_COUNT],
}

impl OptionStore {
    /// Create a store holding compiled-in defaults
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: std::array::from_fn(|i| OPTIONS[i].default_value()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Find an option by its exact, case-sensitive name
    pub fn find(name: &str) -> Option<OptionId> {
        OPTIONS
            .iter()
            .position(|def| def.name == name)
            .and_then(OptionId::from_index)
    }

    /// Read the option file over the current values.
    ///
    /// A missing file is not an error and changes nothing. Unknown names and
    /// lines without a `:` are skipped. Integer values are parsed leniently
    /// and kept even when above their bound. At most `OPTION_COUNT + 1` lines
    /// are parsed; options after that keep their current values.
    pub fn load(&mut self) -> Result<LoadReport, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No option file at {}", self.path.display());
                return Ok(LoadReport::default());
            }
            Err(e) => {
                warn!("Failed to open option file {}: {}", self.path.display(), e);
                return Err(e.into());
            }
        };

        let mut report = LoadReport {
            found: true,
            ..Default::default()
        };

        for line in BufReader::new(file).split(b'\n') {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Option file read stopped after {} lines: {}", report.lines, e);
                    break;
                }
            };
            if report.lines == MAX_LOAD_LINES {
                warn!("Option file exceeds {} lines, ignoring the rest", MAX_LOAD_LINES);
                break;
            }
            report.lines += 1;

            let line = String::from_utf8_lossy(&line);
            let Some((name, value)) = line.split_once(':') else {
                debug!("Skipping option line without delimiter");
                continue;
            };
            let Some(id) = Self::find(name) else {
                debug!("Skipping unknown option {:?}", name);
                continue;
            };

            let value = value.trim();
            self.values[id.index()] = match id.def().kind() {
                OptionKind::Integer { .. } => OptionValue::Int(parse_int_lenient(value)),
                OptionKind::String => OptionValue::Str(value.to_string()),
            };
            report.applied += 1;
        }

        info!(
            "Loaded {} options from {} ({} lines)",
            report.applied,
            self.path.display(),
            report.lines
        );
        Ok(report)
    }

    /// Rewrite the whole option file in table order
    pub fn save(&self) -> Result<(), StoreError> {
        let file = File::create(&self.path).map_err(|e| {
            warn!("Failed to create option file {}: {}", self.path.display(), e);
            e
        })?;

        let mut writer = BufWriter::new(file);
        for (def, value) in self.iter() {
            writeln!(writer, "{}:{}", def.name, value)?;
        }
        writer.flush()?;

        metrics::counter!("option_saves_total").increment(1);
        info!("Saved {} options to {}", OPTION_COUNT, self.path.display());
        Ok(())
    }

    /// Factory reset: delete the file and return to compiled-in defaults.
    ///
    /// The file is only written again by the next `save`.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Removed option file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Option file already absent");
            }
            Err(e) => {
                warn!("Failed to remove option file {}: {}", self.path.display(), e);
                return Err(e.into());
            }
        }
        self.restore_defaults();
        Ok(())
    }

    /// Reset in-memory values to compiled-in defaults
    pub fn restore_defaults(&mut self) {
        for (value, def) in self.values.iter_mut().zip(OPTIONS.iter()) {
            *value = def.default_value();
        }
    }

    /// Startup hook: materialize defaults or load, then migrate the
    /// firmware version while keeping every other value.
    ///
    /// Errors only when the initial save or the load fails. A failed
    /// migration save is logged and the loaded values stay in memory.
    pub fn setup(&mut self, firmware_version: u32) -> Result<SetupOutcome, StoreError> {
        if !self.exists() {
            info!("No option file, saving defaults");
            self.save()?;
            return Ok(SetupOutcome::Initialized);
        }

        self.load()?;
        let stored = self.int(OptionId::FirmwareVersion).unwrap_or(0);
        if stored != firmware_version {
            info!("Firmware changed {} -> {}, re-saving options", stored, firmware_version);
            self.values[OptionId::FirmwareVersion.index()] = OptionValue::Int(firmware_version);
            let saved = match self.save() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Keeping loaded options, migration save failed: {}", e);
                    false
                }
            };
            return Ok(SetupOutcome::Migrated {
                from: stored,
                saved,
            });
        }
        Ok(SetupOutcome::Loaded)
    }

    /// Current value of an option
    pub fn value(&self, id: OptionId) -> &OptionValue {
        &self.values[id.index()]
    }

    /// Integer value, `None` for string options
    pub fn int(&self, id: OptionId) -> Option<u32> {
        self.value(id).as_int()
    }

    /// String value, `None` for integer options
    pub fn string(&self, id: OptionId) -> Option<&str> {
        self.value(id).as_str()
    }

    /// Set an integer option within its bound
    pub fn set_int(&mut self, id: OptionId, value: u32) -> Result<(), StoreError> {
        let def = id.def();
        match def.kind() {
            OptionKind::Integer { max } if value > max => Err(StoreError::OutOfRange {
                name: def.name,
                value,
                max,
            }),
            OptionKind::Integer { .. } => {
                self.values[id.index()] = OptionValue::Int(value);
                Ok(())
            }
            OptionKind::String => Err(StoreError::KindMismatch {
                name: def.name,
                expected: "integer",
            }),
        }
    }

    /// Set a string option.
    ///
    /// Surrounding whitespace is dropped, matching what a reload would
    /// produce. Line breaks would split the record and are rejected.
    pub fn set_string(&mut self, id: OptionId, value: &str) -> Result<(), StoreError> {
        let def = id.def();
        if def.is_integer() {
            return Err(StoreError::KindMismatch {
                name: def.name,
                expected: "string",
            });
        }
        if value.contains(|c: char| c == '\n' || c == '\r') {
            return Err(StoreError::InvalidValue {
                name: def.name,
                reason: "line breaks are not allowed",
            });
        }
        self.values[id.index()] = OptionValue::Str(value.trim().to_string());
        Ok(())
    }

    /// Set an option from request text, parsed by the option's kind.
    ///
    /// Integers must be plain decimal here; only the file loader is lenient.
    pub fn set_from_text(&mut self, id: OptionId, text: &str) -> Result<(), StoreError> {
        let def = id.def();
        if def.is_integer() {
            let value = text.trim().parse::<u32>().map_err(|_| StoreError::InvalidValue {
                name: def.name,
                reason: "not a decimal integer",
            })?;
            self.set_int(id, value)
        } else {
            self.set_string(id, text)
        }
    }

    /// All options with their current values, in table order
    pub fn iter(&self) -> impl Iterator<Item = (&'static OptionDef, &OptionValue)> + '_ {
        OPTIONS.iter().zip(self.values.iter())
    }

    /// Integer options currently above their bound (e.g. from a corrupt file)
    pub fn out_of_range(&self) -> Vec<OptionId> {
        OptionId::ALL
            .into_iter()
            .filter(|id| {
                let def = id.def();
                def.is_integer() && self.int(*id).is_some_and(|v| v > def.max)
            })
            .collect()
    }

    /// Cloud access is on exactly when the token has the expected length
    pub fn cloud_access_enabled(&self) -> bool {
        self.string(OptionId::CloudToken)
            .is_some_and(|token| token.len() == CLOUD_TOKEN_LEN)
    }

    /// Static addressing, when enabled and all three addresses parse
    pub fn static_ip(&self) -> Option<StaticIp> {
        if self.int(OptionId::UseStaticIp) != Some(1) {
            return None;
        }
        let parse = |id| self.string(id)?.parse::<Ipv4Addr>().ok();
        Some(StaticIp {
            address: parse(OptionId::DeviceIp)?,
            gateway: parse(OptionId::GatewayIp)?,
            subnet: parse(OptionId::Subnet)?,
        })
    }
}

/// Parse a leading decimal integer the way the firmware always has:
/// optional sign, then digits up to the first non-digit. Nothing parsable
/// gives 0, negatives give 0 and overflow saturates.
fn parse_int_lenient(text: &str) -> u32 {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut value: u64 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + u64::from(digit - b'0')).min(u64::from(u32::MAX));
    }

    if negative {
        0
    } else {
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_DEVICE_NAME, FIRMWARE_VERSION};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    /// Fresh, empty directory for one test
    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "option-store-test-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn store() -> OptionStore {
        OptionStore::new(temp_dir().join("config.dat"))
    }

    #[test]
    fn test_defaults() {
        let store = store();
        assert_eq!(store.int(OptionId::FirmwareVersion), Some(FIRMWARE_VERSION));
        assert_eq!(store.int(OptionId::DoorThreshold), Some(50));
        assert_eq!(store.string(OptionId::DeviceName), Some(DEFAULT_DEVICE_NAME));
        assert_eq!(store.string(OptionId::Ssid), Some(""));
        assert_eq!(store.int(OptionId::Ssid), None);
    }

    #[test]
    fn test_find_every_compiled_name() {
        for (index, def) in OPTIONS.iter().enumerate() {
            assert_eq!(OptionStore::find(def.name).map(OptionId::index), Some(index));
        }
    }

    #[test]
    fn test_find_is_case_sensitive() {
        assert_eq!(OptionStore::find("dth"), Some(OptionId::DoorThreshold));
        assert_eq!(OptionStore::find("DTH"), None);
        assert_eq!(OptionStore::find("Name"), None);
        assert_eq!(OptionStore::find("name"), Some(OptionId::DeviceName));
    }

    #[test]
    fn test_find_unknown_names() {
        assert_eq!(OptionStore::find(""), None);
        assert_eq!(OptionStore::find("dth "), None);
        assert_eq!(OptionStore::find("bogus"), None);
    }

    #[test]
    fn test_load_missing_file_is_noop() {
        let mut store = store();
        store.set_int(OptionId::DoorThreshold, 80).unwrap();

        let report = store.load().unwrap();
        assert!(!report.found);
        assert_eq!(store.int(OptionId::DoorThreshold), Some(80));
    }

    #[test]
    fn test_save_writes_table_order() {
        let store = store();
        store.save().unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), OPTION_COUNT);
        assert_eq!(lines[0], format!("fwv:{}", FIRMWARE_VERSION));
        assert_eq!(lines[2], "dth:50");
        assert_eq!(lines[15], "ssid:");
        assert_eq!(lines[24], "subn:255.255.255.0");
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = store();
        store.set_int(OptionId::DoorThreshold, 65535).unwrap();
        store.set_int(OptionId::MountType, 1).unwrap();
        store.set_string(OptionId::Ssid, "home network").unwrap();
        store.set_string(OptionId::DeviceName, "").unwrap();
        store.set_string(OptionId::MqttServer, "10.0.0.2:1883").unwrap();
        store.save().unwrap();

        let mut fresh = OptionStore::new(store.path());
        let report = fresh.load().unwrap();
        assert_eq!(report.applied, OPTION_COUNT);
        for id in OptionId::ALL {
            assert_eq!(fresh.value(id), store.value(id), "{} differs", id.name());
        }
    }

    #[test]
    fn test_load_skips_unknown_and_malformed_lines() {
        let mut store = store();
        fs::write(
            store.path(),
            "bogus:1\nno delimiter here\ndth:  75 \r\nname:Side door\n",
        )
        .unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.lines, 4);
        assert_eq!(report.applied, 2);
        assert_eq!(store.int(OptionId::DoorThreshold), Some(75));
        assert_eq!(store.string(OptionId::DeviceName), Some("Side door"));
        assert_eq!(store.int(OptionId::VehicleThreshold), Some(150));
    }

    #[test]
    fn test_load_tolerates_corrupt_integers() {
        let mut store = store();
        fs::write(store.path(), "dth:abc\nvth:99999999\nriv:-5\nhtp:8080xyz\n").unwrap();

        store.load().unwrap();
        assert_eq!(store.int(OptionId::DoorThreshold), Some(0));
        assert_eq!(store.int(OptionId::VehicleThreshold), Some(99_999_999));
        assert_eq!(store.int(OptionId::ReadInterval), Some(0));
        assert_eq!(store.int(OptionId::HttpPort), Some(8080));
        assert_eq!(store.out_of_range(), vec![OptionId::VehicleThreshold]);
    }

    #[test]
    fn test_load_line_cap() {
        let mut store = store();
        let mut text = String::new();
        for _ in 0..OPTION_COUNT + 1 {
            text.push_str("junk:1\n");
        }
        text.push_str("dth:99\n");
        fs::write(store.path(), text).unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.lines, OPTION_COUNT + 1);
        assert_eq!(store.int(OptionId::DoorThreshold), Some(50));
    }

    #[test]
    fn test_load_non_utf8_value() {
        let mut store = store();
        fs::write(store.path(), b"name:gar\xffage\ndth:60\n").unwrap();

        store.load().unwrap();
        assert_eq!(store.int(OptionId::DoorThreshold), Some(60));
        assert!(store.string(OptionId::DeviceName).unwrap().starts_with("gar"));
    }

    #[test]
    fn test_reset_returns_to_defaults() {
        let mut store = store();
        store.set_int(OptionId::DoorThreshold, 10).unwrap();
        store.save().unwrap();

        store.reset().unwrap();
        assert!(!store.exists());
        assert_eq!(store.int(OptionId::DoorThreshold), Some(50));

        let mut fresh = OptionStore::new(store.path());
        assert!(!fresh.load().unwrap().found);
        assert_eq!(fresh.int(OptionId::DoorThreshold), Some(50));

        // resetting twice is harmless
        assert!(store.reset().is_ok());
    }

    #[test]
    fn test_set_int_bounds() {
        let mut store = store();
        assert!(store.set_int(OptionId::UseStaticIp, 1).is_ok());
        assert!(matches!(
            store.set_int(OptionId::UseStaticIp, 2),
            Err(StoreError::OutOfRange { max: 1, .. })
        ));
        assert!(matches!(
            store.set_int(OptionId::Ssid, 1),
            Err(StoreError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_set_string_rules() {
        let mut store = store();
        assert!(matches!(
            store.set_string(OptionId::Password, "a\nb"),
            Err(StoreError::InvalidValue { .. })
        ));
        assert!(matches!(
            store.set_string(OptionId::DoorThreshold, "5"),
            Err(StoreError::KindMismatch { .. })
        ));
        store.set_string(OptionId::Password, "  secret ").unwrap();
        assert_eq!(store.string(OptionId::Password), Some("secret"));
    }

    #[test]
    fn test_set_from_text() {
        let mut store = store();
        store.set_from_text(OptionId::ReadInterval, " 30 ").unwrap();
        assert_eq!(store.int(OptionId::ReadInterval), Some(30));
        assert!(store.set_from_text(OptionId::ReadInterval, "30s").is_err());
        assert!(store.set_from_text(OptionId::ReadInterval, "301").is_err());
        store.set_from_text(OptionId::Ssid, "garage-net").unwrap();
        assert_eq!(store.string(OptionId::Ssid), Some("garage-net"));
    }

    #[test]
    fn test_cloud_access() {
        let mut store = store();
        assert!(!store.cloud_access_enabled());
        store.set_string(OptionId::CloudToken, &"a".repeat(31)).unwrap();
        assert!(!store.cloud_access_enabled());
        store.set_string(OptionId::CloudToken, &"a".repeat(32)).unwrap();
        assert!(store.cloud_access_enabled());
        store.set_string(OptionId::CloudToken, &"a".repeat(33)).unwrap();
        assert!(!store.cloud_access_enabled());
    }

    #[test]
    fn test_setup_initializes_then_loads() {
        let mut store = store();
        assert_eq!(store.setup(FIRMWARE_VERSION).unwrap(), SetupOutcome::Initialized);
        assert!(store.exists());

        let mut again = OptionStore::new(store.path());
        assert_eq!(again.setup(FIRMWARE_VERSION).unwrap(), SetupOutcome::Loaded);
    }

    #[test]
    fn test_setup_migrates_firmware_version() {
        let mut store = store();
        fs::write(store.path(), "fwv:100\ndth:70\nname:Barn\n").unwrap();

        let outcome = store.setup(FIRMWARE_VERSION).unwrap();
        assert_eq!(
            outcome,
            SetupOutcome::Migrated {
                from: 100,
                saved: true
            }
        );
        assert_eq!(store.int(OptionId::FirmwareVersion), Some(FIRMWARE_VERSION));

        let mut reloaded = OptionStore::new(store.path());
        reloaded.load().unwrap();
        assert_eq!(reloaded.int(OptionId::FirmwareVersion), Some(FIRMWARE_VERSION));
        assert_eq!(reloaded.int(OptionId::DoorThreshold), Some(70));
        assert_eq!(reloaded.string(OptionId::DeviceName), Some("Barn"));
    }

    #[cfg(unix)]
    #[test]
    fn test_setup_keeps_loaded_values_when_migration_save_fails() {
        use std::os::unix::fs::PermissionsExt;

        let store_path = temp_dir().join("config.dat");
        fs::write(&store_path, "fwv:100\ndth:70\n").unwrap();
        fs::set_permissions(&store_path, fs::Permissions::from_mode(0o444)).unwrap();
        if fs::OpenOptions::new().write(true).open(&store_path).is_ok() {
            // permissions not enforced for this user
            return;
        }

        let mut store = OptionStore::new(&store_path);
        let outcome = store.setup(FIRMWARE_VERSION).unwrap();

        assert_eq!(
            outcome,
            SetupOutcome::Migrated {
                from: 100,
                saved: false
            }
        );
        assert_eq!(store.int(OptionId::DoorThreshold), Some(70));
        assert_eq!(store.int(OptionId::FirmwareVersion), Some(FIRMWARE_VERSION));
        assert_eq!(
            fs::read_to_string(&store_path).unwrap(),
            "fwv:100\ndth:70\n"
        );

        fs::set_permissions(&store_path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn test_static_ip() {
        let mut store = store();
        assert_eq!(store.static_ip(), None);

        store.set_int(OptionId::UseStaticIp, 1).unwrap();
        // defaults are placeholders
        assert_eq!(store.static_ip(), None);

        store.set_string(OptionId::DeviceIp, "192.168.1.50").unwrap();
        store.set_string(OptionId::GatewayIp, "192.168.1.1").unwrap();
        assert_eq!(
            store.static_ip(),
            Some(StaticIp {
                address: Ipv4Addr::new(192, 168, 1, 50),
                gateway: Ipv4Addr::new(192, 168, 1, 1),
                subnet: Ipv4Addr::new(255, 255, 255, 0),
            })
        );
    }

    #[test]
    fn test_values_serialize_for_reporting() {
        let store = store();
        let json = serde_json::to_value(store.value(OptionId::DoorThreshold)).unwrap();
        assert_eq!(json, serde_json::json!(50));
        let json = serde_json::to_value(store.value(OptionId::Subnet)).unwrap();
        assert_eq!(json, serde_json::json!("255.255.255.0"));
    }

    #[test]
    fn test_parse_int_lenient() {
        assert_eq!(parse_int_lenient("42"), 42);
        assert_eq!(parse_int_lenient("+42"), 42);
        assert_eq!(parse_int_lenient("42abc"), 42);
        assert_eq!(parse_int_lenient(""), 0);
        assert_eq!(parse_int_lenient("-"), 0);
        assert_eq!(parse_int_lenient("-7"), 0);
        assert_eq!(parse_int_lenient("99999999999"), u32::MAX);
    }

    proptest! {
        #[test]
        fn prop_round_trip_any_values(
            threshold in 0u32..=65535,
            name in "[ -~]{0,40}",
        ) {
            let mut store = store();
            store.set_int(OptionId::VehicleThreshold, threshold).unwrap();
            store.set_string(OptionId::DeviceName, &name).unwrap();
            store.save().unwrap();

            let mut fresh = OptionStore::new(store.path());
            fresh.load().unwrap();
            prop_assert_eq!(fresh.int(OptionId::VehicleThreshold), Some(threshold));
            prop_assert_eq!(fresh.string(OptionId::DeviceName), Some(name.trim()));
        }
    }
}
