//! Clean-Slate Resetter
//!
//! Deletes every task list in the destination before a migration. There is no
//! confirmation here: callers are expected to have asked already.

use crate::destination::Destination;
use crate::error::CleanSlateFailure;

/// Delete all lists and return how many were deleted.
///
/// The account's default list cannot be deleted, so its tasks are deleted
/// instead and it is not counted. The first failure aborts the reset.
pub async fn reset<D: Destination>(destination: &mut D) -> Result<usize, CleanSlateFailure> {
    let lists = destination
        .list_lists()
        .await
        .map_err(CleanSlateFailure::Enumerate)?;

    let mut deleted = 0;
    for list in lists {
        if list.is_default {
            let cleared = clear_list(destination, &list.id)
                .await
                .map_err(|source| CleanSlateFailure::Delete {
                    id: list.id.clone(),
                    title: list.title.clone(),
                    deleted,
                    source,
                })?;
            log::info!("Cleared {} task(s) from default list '{}'", cleared, list.title);
            continue;
        }

        destination
            .delete_list(&list.id)
            .await
            .map_err(|source| CleanSlateFailure::Delete {
                id: list.id.clone(),
                title: list.title.clone(),
                deleted,
                source,
            })?;
        log::info!("Deleted task list '{}' ({})", list.title, list.id);
        deleted += 1;
    }

    Ok(deleted)
}

/// Delete the top-level tasks of a list; sub-tasks go with their parent.
async fn clear_list<D: Destination>(
    destination: &mut D,
    list_id: &str,
) -> Result<usize, crate::error::DestinationError> {
    let tasks = destination.list_tasks(list_id).await?;
    let mut cleared = 0;
    for task in tasks.iter().filter(|t| t.parent.is_none()) {
        destination.delete_task(list_id, &task.id).await?;
        cleared += 1;
    }
    Ok(cleared)
}
