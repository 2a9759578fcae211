use vmclone_core::{DatasetPath, DatasetType, Property, PropertySource};

use super::{Zfs, args};
use crate::runner::CommandRunner;
use crate::types::{CreateOptions, DatasetRecord, DestroyOptions, PropertyRecord, PropertySelection};
use crate::{Result, ZfsError};

impl<R: CommandRunner> Zfs<R> {
    /// Lists filesystems and volumes.
    ///
    /// With no `names` every dataset is listed. Otherwise only the named
    /// datasets are listed, plus their descendants when `recursive` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ZfsError::NotFound`] if a named dataset does not exist.
    pub fn list(&self, names: &[DatasetPath], recursive: bool) -> Result<Vec<DatasetRecord>> {
        let mut cmd = args(["list", "-H", "-p", "-o", "name,type", "-t", "filesystem,volume"]);
        if recursive && !names.is_empty() {
            cmd.push("-r".to_string());
        }
        cmd.extend(names.iter().map(ToString::to_string));
        self.parse_records(&cmd)
    }

    /// Lists the direct children of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ZfsError::NotFound`] if `parent` does not exist.
    pub fn list_children(&self, parent: &DatasetPath) -> Result<Vec<DatasetRecord>> {
        let mut cmd = args([
            "list",
            "-H",
            "-p",
            "-o",
            "name,type",
            "-t",
            "filesystem,volume",
            "-d",
            "1",
        ]);
        cmd.push(parent.to_string());
        let mut records = self.parse_records(&cmd)?;
        records.retain(|record| &record.name != parent);
        Ok(records)
    }

    /// # Errors
    ///
    /// Returns an error if the listing fails for any reason other than the
    /// dataset being absent.
    pub fn exists(&self, name: &DatasetPath) -> Result<bool> {
        match self.list(std::slice::from_ref(name), false) {
            Ok(records) => Ok(!records.is_empty()),
            Err(ZfsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn parse_records(&self, cmd: &[String]) -> Result<Vec<DatasetRecord>> {
        let stdout = self.run(cmd)?;
        stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (name, kind) = line
                    .split_once('\t')
                    .ok_or_else(|| self.unexpected(cmd, line))?;
                let kind: DatasetType = kind.parse().map_err(|_| self.unexpected(cmd, line))?;
                Ok(DatasetRecord {
                    name: DatasetPath::new(name)?,
                    kind,
                })
            })
            .collect()
    }

    /// Reads properties of the named datasets (of every dataset if `names` is
    /// empty).
    ///
    /// # Errors
    ///
    /// Returns [`ZfsError::NotFound`] if a named dataset does not exist.
    pub fn get_properties(
        &self,
        names: &[DatasetPath],
        selection: &PropertySelection,
        recursive: bool,
    ) -> Result<Vec<PropertyRecord>> {
        let props = match selection {
            PropertySelection::All => "all".to_string(),
            PropertySelection::Only(list) if list.is_empty() => return Ok(Vec::new()),
            PropertySelection::Only(list) => list.join(","),
        };

        let mut cmd = args([
            "get",
            "-H",
            "-p",
            "-o",
            "name,property,value,source",
            "-t",
            "filesystem,volume",
        ]);
        if recursive && !names.is_empty() {
            cmd.push("-r".to_string());
        }
        cmd.push(props);
        cmd.extend(names.iter().map(ToString::to_string));

        let stdout = self.run(&cmd)?;
        stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let mut columns = line.splitn(4, '\t');
                let (Some(name), Some(property), Some(value), Some(source)) = (
                    columns.next(),
                    columns.next(),
                    columns.next(),
                    columns.next(),
                ) else {
                    return Err(self.unexpected(&cmd, line));
                };
                Ok(PropertyRecord {
                    dataset: DatasetPath::new(name)?,
                    property: Property {
                        name: property.to_string(),
                        value: value.to_string(),
                        source: PropertySource::from_zfs(source),
                    },
                })
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`ZfsError::AlreadyExists`] if the dataset exists, or the
    /// classified engine error.
    pub fn create(&self, name: &DatasetPath, options: &CreateOptions) -> Result<()> {
        let mut cmd = args(["create"]);
        if options.create_ancestors {
            cmd.push("-p".to_string());
        }
        if options.kind == DatasetType::Volume {
            if options.sparse {
                cmd.push("-s".to_string());
            }
            if let Some(size) = options.volsize {
                cmd.push("-V".to_string());
                cmd.push(size.to_string());
            }
        }
        for (key, value) in &options.properties {
            cmd.push("-o".to_string());
            cmd.push(format!("{key}={value}"));
        }
        cmd.push(name.to_string());
        self.run(&cmd).map(drop)
    }

    /// Sets properties in a single command. The engine applies them in the
    /// order given.
    ///
    /// # Errors
    ///
    /// Returns the classified engine error.
    pub fn set_properties(&self, name: &DatasetPath, properties: &[(String, String)]) -> Result<()> {
        if properties.is_empty() {
            return Ok(());
        }
        let mut cmd = args(["set"]);
        cmd.extend(properties.iter().map(|(k, v)| format!("{k}={v}")));
        cmd.push(name.to_string());
        self.run(&cmd).map(drop)
    }

    /// # Errors
    ///
    /// Returns the classified engine error.
    pub fn inherit(&self, name: &DatasetPath, property: &str) -> Result<()> {
        let mut cmd = args(["inherit", property]);
        cmd.push(name.to_string());
        self.run(&cmd).map(drop)
    }

    /// Aborts an interrupted resumable receive into `name`.
    ///
    /// Returns whether the abort command exited successfully. Failing to
    /// spawn the command counts as unsuccessful.
    pub fn abort_receive(&self, name: &DatasetPath) -> bool {
        let mut cmd = args(["recv", "-A"]);
        cmd.push(name.to_string());
        self.exec(&cmd).is_ok_and(|output| output.success())
    }

    /// Destroys a dataset.
    ///
    /// A partially received dataset with a resume token makes `zfs destroy`
    /// fail with "dataset already exists", so any pending receive is aborted
    /// first. That abort may itself remove the dataset; a subsequent "dataset
    /// does not exist" is then treated as success.
    ///
    /// # Errors
    ///
    /// Returns [`ZfsError::Busy`] if the dataset is in use, or the classified
    /// engine error.
    pub fn destroy(&self, name: &DatasetPath, options: DestroyOptions) -> Result<()> {
        let receive_aborted = self.abort_receive(name);

        let mut cmd = args(["destroy"]);
        if options.force {
            cmd.push("-f".to_string());
        }
        if options.recursive {
            cmd.push("-r".to_string());
        }
        cmd.push(name.to_string());

        let output = self.exec(&cmd)?;
        if output.success() {
            return Ok(());
        }
        if receive_aborted && output.stderr.trim().ends_with("dataset does not exist") {
            return Ok(());
        }
        Err(ZfsError::classify(&self.render(&cmd), &output.stderr))
    }
}
