//! WASAPI session backend
//!
//! Talks to the Windows audio session manager on the default render
//! endpoint. `ISimpleAudioVolume` handles are cached per enumeration and
//! replaced wholesale on the next one, so a refresh never leaves a stale
//! handle behind. Runs COM in the multithreaded apartment; callers may be
//! the dispatch worker or a UI-driven assignment.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use windows::core::Interface;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::Media::Audio::{
    eMultimedia, eRender, IAudioSessionControl2, IAudioSessionManager2, IMMDevice,
    IMMDeviceEnumerator, ISimpleAudioVolume, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CLSCTX_ALL, COINIT_MULTITHREADED,
};
use windows::Win32::System::ProcessStatus::GetModuleBaseNameW;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

use super::backend::{AudioSession, SessionBackend, SessionId};
use crate::error::SessionError;

/// Session backend over the Windows audio session manager
pub struct WasapiBackend {
    /// Volume handles from the most recent enumeration, keyed by session
    /// instance identifier
    volumes: Mutex<HashMap<SessionId, ISimpleAudioVolume>>,
    /// Process image names by pid; entries for vanished pids are dropped
    /// after each enumeration pass
    pid_names: DashMap<u32, String>,
}

impl WasapiBackend {
    pub fn new() -> Self {
        Self {
            volumes: Mutex::new(HashMap::new()),
            pid_names: DashMap::new(),
        }
    }

    unsafe fn session_manager() -> Result<IAudioSessionManager2, SessionError> {
        // S_FALSE here just means the thread already joined the MTA
        let _ = CoInitializeEx(None, COINIT_MULTITHREADED);
        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(com_err)?;
        let device: IMMDevice = enumerator
            .GetDefaultAudioEndpoint(eRender, eMultimedia)
            .map_err(com_err)?;
        device.Activate(CLSCTX_ALL, None).map_err(com_err)
    }

    fn process_name(&self, pid: u32) -> String {
        if let Some(name) = self.pid_names.get(&pid) {
            return name.clone();
        }
        let name = unsafe { read_process_name(pid) };
        if !name.is_empty() {
            self.pid_names.insert(pid, name.clone());
        }
        name
    }
}

impl Default for WasapiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for WasapiBackend {
    fn enumerate(&self) -> Result<Vec<AudioSession>, SessionError> {
        let mut sessions = Vec::new();
        let mut volumes = HashMap::new();

        unsafe {
            let manager = Self::session_manager()?;
            let session_list = manager.GetSessionEnumerator().map_err(com_err)?;
            let count = session_list.GetCount().map_err(com_err)?;

            for i in 0..count {
                let Ok(control) = session_list.GetSession(i) else {
                    continue;
                };
                let Ok(control2) = control.cast::<IAudioSessionControl2>() else {
                    continue;
                };
                let Ok(pid) = control2.GetProcessId() else {
                    continue;
                };
                // pid 0 is the system-sounds session
                if pid == 0 {
                    continue;
                }
                let process_name = self.process_name(pid);
                if process_name.is_empty() {
                    continue;
                }
                let Ok(instance_id) = control2.GetSessionInstanceIdentifier() else {
                    continue;
                };
                let id = SessionId::new(take_pwstr(instance_id));
                let display_name = match control2.GetDisplayName() {
                    Ok(pwstr) => {
                        let name = take_pwstr(pwstr);
                        if name.is_empty() {
                            process_name.clone()
                        } else {
                            name
                        }
                    }
                    Err(_) => process_name.clone(),
                };
                let Ok(volume) = control.cast::<ISimpleAudioVolume>() else {
                    continue;
                };

                volumes.insert(id.clone(), volume);
                sessions.push(AudioSession {
                    id,
                    process_id: pid,
                    process_name,
                    display_name,
                });
            }
        }

        self.pid_names
            .retain(|pid, _| sessions.iter().any(|s| s.process_id == *pid));
        *self.volumes.lock() = volumes;

        debug!("enumerated {} audio sessions", sessions.len());
        Ok(sessions)
    }

    fn set_volume(&self, id: &SessionId, volume: f32) -> Result<(), SessionError> {
        let handle = self
            .volumes
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        unsafe {
            let _ = CoInitializeEx(None, COINIT_MULTITHREADED);
            handle
                .SetMasterVolume(volume, std::ptr::null())
                .map_err(|e| SessionError::VolumeSetFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                })
        }
    }
}

fn com_err(e: windows::core::Error) -> SessionError {
    SessionError::Com(e.to_string())
}

/// Image name of a process, lower-cased; empty when the process cannot
/// be opened (exited, or access denied)
unsafe fn read_process_name(pid: u32) -> String {
    if let Ok(handle) = OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid) {
        let mut buffer = [0u16; 1024];
        let len = GetModuleBaseNameW(handle, None, &mut buffer);
        let _ = CloseHandle(handle);
        if len > 0 {
            return String::from_utf16_lossy(&buffer[..len as usize]).to_lowercase();
        }
    }
    String::new()
}

/// Copy a COM-allocated wide string and free the allocation
unsafe fn take_pwstr(pwstr: windows::core::PWSTR) -> String {
    if pwstr.is_null() {
        return String::new();
    }
    let value = pwstr.to_string().unwrap_or_default();
    CoTaskMemFree(Some(pwstr.as_ptr() as *const _));
    value
}
