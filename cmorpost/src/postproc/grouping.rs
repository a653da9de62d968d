//! Task grouping and group validation.
//!
//! Tasks whose derived pipelines serialize to the same canonical string
//! share one command, so the external tool runs once per distinct
//! pipeline no matter how many targets consume its output.

use crate::cdo::CdoCommand;
use crate::task::Task;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::error;

/// One deduplicated command and every task it serves.
#[derive(Debug)]
pub struct CommandGroup {
    pub command: CdoCommand,
    pub tasks: Vec<Arc<Task>>,
}

/// Partitions planned tasks into groups keyed by canonical command string.
///
/// Group order follows first appearance of each distinct command, so
/// serial execution is deterministic for a given task order.
pub fn group_tasks(planned: Vec<(Arc<Task>, CdoCommand)>) -> Vec<CommandGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<CommandGroup> = Vec::new();
    for (task, command) in planned {
        let key = command.canonical();
        match index.get(&key) {
            Some(&i) => groups[i].tasks.push(task),
            None => {
                index.insert(key, groups.len());
                groups.push(CommandGroup {
                    command,
                    tasks: vec![task],
                });
            }
        }
    }
    groups
}

/// Checks that a grouping is safe to execute as one command.
///
/// Tasks sharing a pipeline must agree on the output frequency; anything
/// else would splice different time granularities into one output file.
pub fn validate_group(group: &CommandGroup) -> bool {
    let frequencies: HashSet<_> = group
        .tasks
        .iter()
        .map(|t| t.target().frequency)
        .collect();
    if frequencies.len() != 1 {
        error!(
            command = %group.command,
            frequencies = ?frequencies,
            "Multiple target frequencies joined to a single command"
        );
        return false;
    }
    true
}
