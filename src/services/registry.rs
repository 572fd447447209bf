use windows::core::PCWSTR;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, WIN32_ERROR};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_BINARY, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS,
    REG_SZ, REG_VALUE_TYPE,
};

use super::error::PersistenceError;
use super::settings::{SettingsBackend, StoredValue, APP_DIR_NAME};

/// Settings stored as values under `HKEY_CURRENT_USER\Software\VisualBreak`.
/// Text entries are `REG_SZ`, byte entries `REG_BINARY`.
pub struct RegistryBackend {
    subkey: String,
}

impl RegistryBackend {
    pub fn new() -> Self {
        Self {
            subkey: format!("Software\\{APP_DIR_NAME}"),
        }
    }
}

impl Default for RegistryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn check(result: WIN32_ERROR, key: &str) -> Result<(), PersistenceError> {
    if result.is_ok() {
        Ok(())
    } else {
        Err(PersistenceError::Registry {
            key: key.to_string(),
            code: result.0,
        })
    }
}

/// Closes the handle when dropped.
struct OpenKey(HKEY);

impl Drop for OpenKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

impl RegistryBackend {
    /// `Ok(None)` when the key itself does not exist yet.
    fn open_read(&self) -> Result<Option<OpenKey>, PersistenceError> {
        let subkey_w = wide(&self.subkey);
        let mut hkey = HKEY::default();
        let result = unsafe {
            RegOpenKeyExW(HKEY_CURRENT_USER, PCWSTR(subkey_w.as_ptr()), 0, KEY_READ, &mut hkey)
        };
        if result == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        check(result, &self.subkey)?;
        Ok(Some(OpenKey(hkey)))
    }

    fn create(&self, access: REG_SAM_FLAGS) -> Result<OpenKey, PersistenceError> {
        let subkey_w = wide(&self.subkey);
        let mut hkey = HKEY::default();
        let result = unsafe {
            RegCreateKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR(subkey_w.as_ptr()),
                0,
                None,
                REG_OPTION_NON_VOLATILE,
                access,
                None,
                &mut hkey,
                None,
            )
        };
        check(result, &self.subkey)?;
        Ok(OpenKey(hkey))
    }
}

impl SettingsBackend for RegistryBackend {
    fn prepare(&mut self) -> Result<(), PersistenceError> {
        self.create(KEY_WRITE).map(drop)
    }

    fn read(&self, key: &str) -> Result<Option<StoredValue>, PersistenceError> {
        let Some(handle) = self.open_read()? else {
            return Ok(None);
        };
        let value_w = wide(key);
        let mut value_type = REG_VALUE_TYPE::default();
        let mut data_size: u32 = 0;

        // First call to get type and size
        let result = unsafe {
            RegQueryValueExW(
                handle.0,
                PCWSTR(value_w.as_ptr()),
                None,
                Some(&mut value_type),
                None,
                Some(&mut data_size),
            )
        };
        if result == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        check(result, key)?;

        let mut buffer = vec![0u8; data_size as usize];
        let result = unsafe {
            RegQueryValueExW(
                handle.0,
                PCWSTR(value_w.as_ptr()),
                None,
                Some(&mut value_type),
                Some(buffer.as_mut_ptr()),
                Some(&mut data_size),
            )
        };
        check(result, key)?;
        buffer.truncate(data_size as usize);

        let value = if value_type == REG_SZ {
            let mut units: Vec<u16> = buffer
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            // Remove null terminator
            while units.last() == Some(&0) {
                units.pop();
            }
            StoredValue::Text(String::from_utf16_lossy(&units))
        } else if value_type == REG_BINARY {
            StoredValue::Bytes(buffer)
        } else {
            StoredValue::Unsupported
        };
        Ok(Some(value))
    }

    fn write(&mut self, key: &str, value: StoredValue) -> Result<(), PersistenceError> {
        let (value_type, data) = match value {
            StoredValue::Text(text) => (
                REG_SZ,
                wide(&text).iter().flat_map(|unit| unit.to_le_bytes()).collect::<Vec<u8>>(),
            ),
            StoredValue::Bytes(bytes) => (REG_BINARY, bytes),
            StoredValue::Unsupported => return Err(PersistenceError::Unavailable),
        };
        let handle = self.create(KEY_WRITE)?;
        let value_w = wide(key);
        let result = unsafe {
            RegSetValueExW(handle.0, PCWSTR(value_w.as_ptr()), 0, value_type, Some(data.as_slice()))
        };
        check(result, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subkey_lives_under_software() {
        assert_eq!(RegistryBackend::new().subkey, "Software\\VisualBreak");
    }

    #[test]
    fn wide_strings_are_nul_terminated() {
        assert_eq!(wide("en"), vec![u16::from(b'e'), u16::from(b'n'), 0]);
    }
}
