//! OpenNebula inventory client built on `onevm list -x`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio::process::Command;
use tracing::debug;
use tracing::instrument;

use crate::domain::InventoryClient;
use crate::domain::InventoryError;
use crate::domain::InventoryVm;

/// Element names below a `VM` element, relative to the document root.
const VM_DEPTH: usize = 2;

/// Runs the orchestrator CLI and parses its XML VM pool.
pub struct OneVmClient {
    command: Vec<String>,
    timeout: Duration,
    prefix_variable: String,
}

impl OneVmClient {
    /// `command` is the program followed by its arguments.
    pub fn new(
        command: Vec<String>,
        timeout: Duration,
        prefix_variable: impl Into<String>,
    ) -> Self {
        Self {
            command,
            timeout,
            prefix_variable: prefix_variable.into(),
        }
    }

    async fn run_command(&self) -> Result<String, Report<InventoryError>> {
        let (program, args) = self.command.split_first().ok_or_else(|| {
            Report::new(InventoryError::Fetch {
                message: "empty inventory command".to_string(),
            })
        })?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .change_context_lazy(|| InventoryError::Fetch {
                message: format!("{program} timed out after {}s", self.timeout.as_secs()),
            })?
            .change_context_lazy(|| InventoryError::Fetch {
                message: format!("failed to run {program}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Report::new(InventoryError::Fetch {
                message: format!("{program} exited with {}: {}", output.status, stderr.trim()),
            }));
        }

        String::from_utf8(output.stdout).change_context(InventoryError::Fetch {
            message: "inventory output is not valid UTF-8".to_string(),
        })
    }
}

#[async_trait]
impl InventoryClient for OneVmClient {
    #[instrument(level = "debug", skip(self))]
    async fn list_vms(&self) -> Result<Vec<InventoryVm>, Report<InventoryError>> {
        let xml = self.run_command().await?;
        let vms = parse_vm_pool(&xml, &self.prefix_variable)?;
        debug!(count = vms.len(), "Parsed VM inventory");
        Ok(vms)
    }
}

/// Parses a `VM_POOL` document into inventory records.
///
/// Each element named `VM` directly below the root is one record. `ID` and
/// `NAME` are read from direct children, `HOSTNAME` and `prefix_variable`
/// from any deeper descendant. When several are present the first one in
/// document order wins.
pub fn parse_vm_pool(
    xml: &str,
    prefix_variable: &str,
) -> Result<Vec<InventoryVm>, Report<InventoryError>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut vms = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut current: Option<PartialVm> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Report::new(InventoryError::Parse {
                message: format!("malformed XML at byte {}: {e}", reader.buffer_position()),
            })
        })?;

        match event {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if path.len() == VM_DEPTH - 1 && name == "VM" {
                    current = Some(PartialVm::default());
                }
                path.push(name);
                text.clear();
            }
            Event::Empty(empty) => {
                // <VM/> carries no ID and is as malformed as a VM without one
                if path.len() == VM_DEPTH - 1 && empty.name().as_ref() == b"VM" {
                    return Err(missing_id());
                }
                if let Some(vm) = current.as_mut() {
                    let depth = path.len() + 1;
                    let name = empty.name();
                    if depth > VM_DEPTH + 1 && name.as_ref() == b"HOSTNAME" {
                        vm.hostname.get_or_insert(None);
                    } else if depth > VM_DEPTH + 1 && name.as_ref() == prefix_variable.as_bytes() {
                        vm.prefix_override.get_or_insert(None);
                    }
                }
            }
            Event::Text(t) => {
                let unescaped = t.unescape().map_err(|e| {
                    Report::new(InventoryError::Parse {
                        message: format!("invalid XML text: {e}"),
                    })
                })?;
                text.push_str(&unescaped);
            }
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let Some(name) = path.pop() else {
                    continue;
                };
                let depth = path.len() + 1;

                if let Some(vm) = current.as_mut() {
                    if depth == VM_DEPTH + 1 && name == "ID" {
                        vm.id = Some(text.trim().to_string());
                    } else if depth == VM_DEPTH + 1 && name == "NAME" {
                        vm.name = Some(text.trim().to_string());
                    } else if depth > VM_DEPTH + 1 && name == "HOSTNAME" {
                        vm.hostname.get_or_insert_with(|| non_blank(&text));
                    } else if depth > VM_DEPTH + 1 && name == prefix_variable {
                        vm.prefix_override.get_or_insert_with(|| non_blank(&text));
                    }
                }

                if depth == VM_DEPTH && name == "VM" {
                    if let Some(vm) = current.take() {
                        vms.push(vm.finish()?);
                    }
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(Report::new(InventoryError::Parse {
            message: format!("unexpected end of document inside <{}>", path.join("/")),
        }));
    }

    Ok(vms)
}

#[derive(Default)]
struct PartialVm {
    id: Option<String>,
    name: Option<String>,
    /// First nested element in document order, blank or not
    hostname: Option<Option<String>>,
    prefix_override: Option<Option<String>>,
}

impl PartialVm {
    fn finish(self) -> Result<InventoryVm, Report<InventoryError>> {
        let id = self.id.filter(|id| !id.is_empty()).ok_or_else(missing_id)?;
        Ok(InventoryVm {
            id,
            name: self.name.unwrap_or_default(),
            hostname: self.hostname.flatten(),
            prefix_override: self.prefix_override.flatten(),
        })
    }
}

fn missing_id() -> Report<InventoryError> {
    Report::new(InventoryError::Parse {
        message: "VM element without ID".to_string(),
    })
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
