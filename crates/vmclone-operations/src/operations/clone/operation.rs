use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use vmclone_core::{
    CLONE_SUFFIX, CloneNameFamily, Device, DeviceAttributes, Entity, EntityId, ZvolRoot, allocate,
};
use vmclone_saga::SagaAuditLog;

use super::context::CloneSagaContext;
use super::ledger::{CloneLedger, SnapshotCloneStep};
use crate::Result;
use crate::traits::{DatasetStore, DeviceStore, EntityStore, PortAllocator};

pub struct CloneInput {
    pub source: EntityId,
    /// Used verbatim when set; otherwise a `<source><suffix><n>` name is
    /// allocated.
    pub name: Option<String>,
}

#[derive(Debug)]
pub struct CloneOutput {
    pub id: EntityId,
    pub name: String,
    /// Devices that were skipped and need manual attention.
    pub warnings: Vec<String>,
    pub audit_log: SagaAuditLog,
}

/// Progress of one clone run. Only visible through `debug!` transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloneState {
    Init,
    DuplicatingEntity,
    CloningDevices,
    Committed,
    RollingBack,
    Failed,
}

impl CloneState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

impl fmt::Display for CloneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::DuplicatingEntity => "duplicating_entity",
            Self::CloningDevices => "cloning_devices",
            Self::Committed => "committed",
            Self::RollingBack => "rolling_back",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn advance(state: &mut CloneState, next: CloneState) {
    debug_assert!(!state.is_terminal(), "no transition out of {state}");
    debug!(from = %state, to = %next, "clone state transition");
    *state = next;
}

fn fresh_uuid(taken: Uuid) -> Uuid {
    loop {
        let uuid = Uuid::new_v4();
        if uuid != taken {
            return uuid;
        }
    }
}

/// Duplicates a VM together with its devices, cloning every zvol-backed disk.
///
/// If any device fails, the snapshots and clones created so far are removed
/// and the device error is returned. The new VM record itself stays behind.
pub struct CloneOperation<E, D, P, S> {
    entities: Arc<E>,
    devices: Arc<D>,
    ports: Arc<P>,
    datasets: Arc<S>,
    suffix: String,
    zvol_root: ZvolRoot,
}

impl<E, D, P, S> CloneOperation<E, D, P, S>
where
    E: EntityStore,
    D: DeviceStore,
    P: PortAllocator,
    S: DatasetStore,
{
    pub fn new(entities: Arc<E>, devices: Arc<D>, ports: Arc<P>, datasets: Arc<S>) -> Self {
        Self {
            entities,
            devices,
            ports,
            datasets,
            suffix: CLONE_SUFFIX.to_string(),
            zvol_root: ZvolRoot::default(),
        }
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_zvol_root(mut self, zvol_root: ZvolRoot) -> Self {
        self.zvol_root = zvol_root;
        self
    }

    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`](crate::OperationError::NotFound)
    /// if the source VM does not exist. Any failure while cloning devices is
    /// returned unchanged after the storage created so far has been rolled
    /// back.
    pub fn execute(&self, input: CloneInput) -> Result<CloneOutput> {
        let mut state = CloneState::Init;
        let mut audit_log = SagaAuditLog::new();

        let source = self.entities.get(input.source)?;

        advance(&mut state, CloneState::DuplicatingEntity);
        let entity = self.duplicate_entity(&source, input.name, &mut audit_log)?;

        advance(&mut state, CloneState::CloningDevices);
        let ctx = CloneSagaContext::new(Arc::clone(&self.datasets), self.suffix.as_str());
        let mut ledger = CloneLedger::new();
        let mut warnings = Vec::new();

        for device in &source.devices {
            let result = self.clone_device(
                &ctx,
                device,
                &entity,
                &mut ledger,
                &mut warnings,
                &mut audit_log,
            );
            if let Err(error) = result {
                advance(&mut state, CloneState::RollingBack);
                let dangling = ledger.rollback(&ctx, &mut audit_log);
                warn!(
                    id = %entity.id,
                    name = %entity.name,
                    dangling,
                    "clone failed, VM record left in inventory"
                );
                advance(&mut state, CloneState::Failed);
                return Err(error);
            }
        }

        advance(&mut state, CloneState::Committed);
        info!("VM cloned from {} to {}", source.name, entity.name);

        Ok(CloneOutput {
            id: entity.id,
            name: entity.name,
            warnings,
            audit_log,
        })
    }

    fn duplicate_entity(
        &self,
        source: &Entity,
        name: Option<String>,
        audit_log: &mut SagaAuditLog,
    ) -> Result<Entity> {
        let name = match name {
            Some(name) => name,
            None => {
                let family = CloneNameFamily::of(&source.name, &self.suffix);
                let existing = self.entities.list_names(&family)?;
                allocate(&source.name, &self.suffix, &existing)
            }
        };

        let index = audit_log.record_start("duplicate_entity");
        match self
            .entities
            .create(source.duplicate_spec(name, fresh_uuid(source.uuid)))
        {
            Ok(entity) => {
                debug!(source = %source.id, id = %entity.id, name = %entity.name, "duplicated VM record");
                audit_log.record_success(index, None);
                Ok(entity)
            }
            Err(error) => {
                audit_log.record_failure(index);
                Err(error)
            }
        }
    }

    fn clone_device(
        &self,
        ctx: &CloneSagaContext<S>,
        device: &Device,
        entity: &Entity,
        ledger: &mut CloneLedger,
        warnings: &mut Vec<String>,
        audit_log: &mut SagaAuditLog,
    ) -> Result<()> {
        let mut copy = device.duplicate_for(entity.id);

        match &mut copy.attributes {
            DeviceAttributes::Nic(nic) => nic.mac = None,
            DeviceAttributes::Display(display) => display.set_ports(self.ports.allocate()?),
            DeviceAttributes::Disk(disk) => {
                let dataset = self.zvol_root.path_to_name(disk.path())?;
                let clone =
                    SnapshotCloneStep::new().run(ctx, &dataset, &entity.name, ledger, audit_log)?;
                disk.set_path(self.zvol_root.name_to_path(&clone))?;
            }
            DeviceAttributes::Raw(raw) => {
                let warning = format!(
                    "RAW device {} was not cloned, copy it manually",
                    raw.path
                );
                warn!(vm = %entity.name, path = %raw.path, "skipping RAW device");
                warnings.push(warning);
                return Ok(());
            }
        }

        let index = audit_log.record_start("create_device");
        match self.devices.create(copy) {
            Ok(created) => {
                debug!(vm = %entity.id, device_type = ?created.device_type(), "created device");
                audit_log.record_success(index, None);
                Ok(())
            }
            Err(error) => {
                audit_log.record_failure(index);
                Err(error)
            }
        }
    }
}
