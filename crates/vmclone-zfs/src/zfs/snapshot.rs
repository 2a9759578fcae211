use vmclone_core::{DatasetPath, SnapshotId};

use super::{Zfs, args};
use crate::Result;
use crate::runner::CommandRunner;
use crate::types::{Hold, SnapshotDestroyOptions};

impl<R: CommandRunner> Zfs<R> {
    /// Lists snapshots of `dataset`, including those of its descendants when
    /// `recursive` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ZfsError::NotFound`](crate::ZfsError::NotFound) if the
    /// dataset does not exist.
    pub fn list_snapshots(&self, dataset: &DatasetPath, recursive: bool) -> Result<Vec<SnapshotId>> {
        let mut cmd = args(["list", "-H", "-p", "-o", "name", "-t", "snapshot"]);
        if recursive {
            cmd.push("-r".to_string());
        } else {
            cmd.extend(args(["-d", "1"]));
        }
        cmd.push(dataset.to_string());

        let stdout = self.run(&cmd)?;
        stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| line.parse::<SnapshotId>().map_err(Into::into))
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`ZfsError::AlreadyExists`](crate::ZfsError::AlreadyExists) if
    /// a snapshot of that name exists.
    pub fn snapshot(&self, id: &SnapshotId, recursive: bool) -> Result<()> {
        let mut cmd = args(["snapshot"]);
        if recursive {
            cmd.push("-r".to_string());
        }
        cmd.push(id.to_string());
        self.run(&cmd).map(drop)
    }

    /// # Errors
    ///
    /// Returns the classified engine error. A held snapshot fails with
    /// [`ZfsError::Busy`](crate::ZfsError::Busy) unless `defer` is set.
    pub fn destroy_snapshot(&self, id: &SnapshotId, options: SnapshotDestroyOptions) -> Result<()> {
        let mut cmd = args(["destroy"]);
        if options.defer {
            cmd.push("-d".to_string());
        }
        if options.recursive {
            cmd.push("-r".to_string());
        }
        cmd.push(id.to_string());
        self.run(&cmd).map(drop)
    }

    /// Creates a writable clone of `snapshot` at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ZfsError::AlreadyExists`](crate::ZfsError::AlreadyExists) if
    /// `target` exists.
    pub fn clone_snapshot(
        &self,
        snapshot: &SnapshotId,
        target: &DatasetPath,
        properties: &[(String, String)],
    ) -> Result<()> {
        let mut cmd = args(["clone"]);
        for (key, value) in properties {
            cmd.push("-o".to_string());
            cmd.push(format!("{key}={value}"));
        }
        cmd.push(snapshot.to_string());
        cmd.push(target.to_string());
        self.run(&cmd).map(drop)
    }

    /// # Errors
    ///
    /// Returns the classified engine error.
    pub fn hold(&self, id: &SnapshotId, tag: &str, recursive: bool) -> Result<()> {
        let mut cmd = args(["hold"]);
        if recursive {
            cmd.push("-r".to_string());
        }
        cmd.push(tag.to_string());
        cmd.push(id.to_string());
        self.run(&cmd).map(drop)
    }

    /// # Errors
    ///
    /// Returns the classified engine error.
    pub fn release(&self, id: &SnapshotId, tag: &str, recursive: bool) -> Result<()> {
        let mut cmd = args(["release"]);
        if recursive {
            cmd.push("-r".to_string());
        }
        cmd.push(tag.to_string());
        cmd.push(id.to_string());
        self.run(&cmd).map(drop)
    }

    /// # Errors
    ///
    /// Returns the classified engine error, or
    /// [`ZfsError::UnexpectedOutput`](crate::ZfsError::UnexpectedOutput) for
    /// lines that are not `name<TAB>tag<TAB>timestamp`.
    pub fn holds(&self, id: &SnapshotId) -> Result<Vec<Hold>> {
        let mut cmd = args(["holds", "-H"]);
        cmd.push(id.to_string());

        let stdout = self.run(&cmd)?;
        stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let mut columns = line.splitn(3, '\t');
                let (Some(_), Some(tag), Some(created)) =
                    (columns.next(), columns.next(), columns.next())
                else {
                    return Err(self.unexpected(&cmd, line));
                };
                Ok(Hold {
                    tag: tag.to_string(),
                    created: created.trim().to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ZfsError;
    use crate::testing::{ScriptedRunner, fail, ok};

    fn snap(s: &str) -> SnapshotId {
        s.parse().expect("valid snapshot")
    }

    fn zfs(runner: ScriptedRunner) -> Zfs<ScriptedRunner> {
        Zfs::with_runner(runner, "zfs")
    }

    #[test]
    fn list_snapshots_uses_depth_one_by_default() -> anyhow::Result<()> {
        let zfs = zfs(ScriptedRunner::new().on(
            &["zfs", "list"],
            ok("tank/a@daily\ntank/a@vm1_clone0\n"),
        ));

        let snapshots = zfs.list_snapshots(&"tank/a".parse()?, false)?;

        assert_eq!(snapshots, vec![snap("tank/a@daily"), snap("tank/a@vm1_clone0")]);
        assert_eq!(
            zfs.runner().call_lines(),
            vec!["zfs list -H -p -o name -t snapshot -d 1 tank/a"]
        );
        Ok(())
    }

    #[test]
    fn list_snapshots_recursive() -> anyhow::Result<()> {
        let zfs = zfs(ScriptedRunner::new());
        zfs.list_snapshots(&"tank".parse()?, true)?;
        assert_eq!(
            zfs.runner().call_lines(),
            vec!["zfs list -H -p -o name -t snapshot -r tank"]
        );
        Ok(())
    }

    #[test]
    fn snapshot_collision_is_classified() {
        let zfs = zfs(ScriptedRunner::new().on(
            &["zfs", "snapshot"],
            fail(1, "cannot create snapshot 'tank/a@s': dataset already exists"),
        ));

        let result = zfs.snapshot(&snap("tank/a@s"), false);
        assert!(matches!(result, Err(ZfsError::AlreadyExists { .. })));
    }

    #[test]
    fn destroy_snapshot_flags() -> anyhow::Result<()> {
        let zfs = zfs(ScriptedRunner::new());
        zfs.destroy_snapshot(
            &snap("tank/a@s"),
            SnapshotDestroyOptions {
                defer: true,
                recursive: false,
            },
        )?;
        assert_eq!(zfs.runner().call_lines(), vec!["zfs destroy -d tank/a@s"]);
        Ok(())
    }

    #[test]
    fn clone_snapshot_places_options_before_operands() -> anyhow::Result<()> {
        let zfs = zfs(ScriptedRunner::new());
        zfs.clone_snapshot(
            &snap("tank/a@s"),
            &"tank/b".parse()?,
            &[("readonly".to_string(), "off".to_string())],
        )?;
        assert_eq!(
            zfs.runner().call_lines(),
            vec!["zfs clone -o readonly=off tank/a@s tank/b"]
        );
        Ok(())
    }

    #[test]
    fn hold_and_release_pass_tag() -> anyhow::Result<()> {
        let zfs = zfs(ScriptedRunner::new());
        zfs.hold(&snap("tank/a@s"), "vmclone", true)?;
        zfs.release(&snap("tank/a@s"), "vmclone", false)?;
        assert_eq!(
            zfs.runner().call_lines(),
            vec!["zfs hold -r vmclone tank/a@s", "zfs release vmclone tank/a@s"]
        );
        Ok(())
    }

    #[test]
    fn holds_parses_tags() -> anyhow::Result<()> {
        let zfs = zfs(ScriptedRunner::new().on(
            &["zfs", "holds"],
            ok("tank/a@s\tvmclone\tThu Oct 15 10:00 2026\ntank/a@s\tbackup\tFri Oct 16 09:12 2026\n"),
        ));

        let holds = zfs.holds(&snap("tank/a@s"))?;

        assert_eq!(holds.len(), 2);
        assert_eq!(holds[0].tag, "vmclone");
        assert_eq!(holds[1].created, "Fri Oct 16 09:12 2026");
        Ok(())
    }
}
