use std::collections::{HashMap, HashSet};

use sea_orm::*;

use crate::entity::application_option_item::{self, OptionKind};
use crate::error::AppError;
use crate::models::option_item::{
    CampusNode, CourseNode, FacultyNode, OptionItemResponse, OptionTreeResponse,
};

/// Assemble the campus→faculty→course tree and the flat provider list from
/// the flat parent-referencing rows.
///
/// Inactive nodes are skipped; so are nodes whose parent chain is broken or
/// inactive (an orphaned faculty takes its courses with it).
pub fn build_option_tree(items: &[application_option_item::Model]) -> OptionTreeResponse {
    let mut sorted: Vec<&application_option_item::Model> = items.iter().collect();
    sorted.sort_by_key(|i| (i.position, i.id));

    let mut children: HashMap<i32, Vec<&application_option_item::Model>> = HashMap::new();
    for item in &sorted {
        if !item.active {
            continue;
        }
        if let Some(parent_id) = item.parent_id {
            children.entry(parent_id).or_default().push(item);
        }
    }

    let campuses = sorted
        .iter()
        .filter(|i| i.active && i.kind == OptionKind::Campus)
        .map(|campus| CampusNode {
            id: campus.id,
            name: campus.name.clone(),
            faculties: children
                .get(&campus.id)
                .map(|faculties| {
                    faculties
                        .iter()
                        .filter(|f| f.kind == OptionKind::Faculty)
                        .map(|faculty| FacultyNode {
                            id: faculty.id,
                            name: faculty.name.clone(),
                            courses: children
                                .get(&faculty.id)
                                .map(|courses| {
                                    courses
                                        .iter()
                                        .filter(|c| c.kind == OptionKind::Course)
                                        .map(|course| CourseNode {
                                            id: course.id,
                                            name: course.name.clone(),
                                        })
                                        .collect()
                                })
                                .unwrap_or_default(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();

    let support_providers = sorted
        .iter()
        .filter(|i| i.active && i.kind == OptionKind::SupportProvider)
        .map(|i| OptionItemResponse::from((*i).clone()))
        .collect();

    OptionTreeResponse {
        campuses,
        support_providers,
    }
}

/// Check a campus→faculty→course selection against loaded reference rows.
///
/// Each node must exist, be active and carry the right kind, and the parent
/// chain must match the stated selection even when every node individually
/// exists.
fn check_course_path(
    items: &HashMap<i32, application_option_item::Model>,
    campus_id: i32,
    faculty_id: i32,
    course_id: i32,
) -> Result<(), AppError> {
    let course = items
        .get(&course_id)
        .filter(|c| c.active && c.kind == OptionKind::Course)
        .ok_or_else(|| AppError::InvalidCourse(format!("Course {course_id} is not available")))?;

    let faculty = items
        .get(&faculty_id)
        .filter(|f| f.active && f.kind == OptionKind::Faculty)
        .ok_or_else(|| {
            AppError::InvalidPath(format!("Faculty {faculty_id} is not available"))
        })?;

    let campus = items
        .get(&campus_id)
        .filter(|c| c.active && c.kind == OptionKind::Campus)
        .ok_or_else(|| AppError::InvalidPath(format!("Campus {campus_id} is not available")))?;

    if course.parent_id != Some(faculty.id) {
        return Err(AppError::InvalidPath(format!(
            "Course {course_id} does not belong to faculty {faculty_id}"
        )));
    }
    if faculty.parent_id != Some(campus.id) {
        return Err(AppError::InvalidPath(format!(
            "Faculty {faculty_id} does not belong to campus {campus_id}"
        )));
    }

    Ok(())
}

/// Load the three selected nodes and check the path.
pub async fn validate_course_path<C: ConnectionTrait>(
    db: &C,
    campus_id: i32,
    faculty_id: i32,
    course_id: i32,
) -> Result<(), AppError> {
    let ids = vec![campus_id, faculty_id, course_id];
    let items: HashMap<i32, application_option_item::Model> = application_option_item::Entity::find()
        .filter(application_option_item::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();

    check_course_path(&items, campus_id, faculty_id, course_id)
}

/// Check every selected support provider against the active provider set.
pub async fn validate_support_providers<C: ConnectionTrait>(
    db: &C,
    provider_ids: &[i32],
) -> Result<(), AppError> {
    if provider_ids.is_empty() {
        return Ok(());
    }

    let active: HashSet<i32> = application_option_item::Entity::find()
        .filter(application_option_item::Column::Kind.eq(OptionKind::SupportProvider))
        .filter(application_option_item::Column::Active.eq(true))
        .filter(application_option_item::Column::Id.is_in(provider_ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();

    let unknown: Vec<i32> = provider_ids
        .iter()
        .copied()
        .filter(|id| !active.contains(id))
        .collect();

    if !unknown.is_empty() {
        return Err(AppError::InvalidSupportProvider(format!(
            "Unknown or inactive support providers: {unknown:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(
        id: i32,
        kind: OptionKind,
        name: &str,
        parent_id: Option<i32>,
        active: bool,
        position: i32,
    ) -> application_option_item::Model {
        application_option_item::Model {
            id,
            kind,
            name: name.into(),
            parent_id,
            active,
            position,
            created_at: Utc::now(),
        }
    }

    fn fixture() -> Vec<application_option_item::Model> {
        vec![
            item(1, OptionKind::Campus, "Cyberjaya", None, true, 0),
            item(2, OptionKind::Campus, "Melaka", None, true, 1),
            item(3, OptionKind::Faculty, "Faculty of Computing", Some(1), true, 0),
            item(4, OptionKind::Faculty, "Faculty of Engineering", Some(1), true, 1),
            item(5, OptionKind::Course, "BSc Computer Science", Some(3), true, 0),
            item(6, OptionKind::Course, "BSc Data Science", Some(3), true, 1),
            item(7, OptionKind::SupportProvider, "Baitulmal", None, true, 0),
            item(8, OptionKind::SupportProvider, "State Foundation", None, true, 1),
        ]
    }

    #[test]
    fn builds_nested_tree() {
        let tree = build_option_tree(&fixture());

        assert_eq!(tree.campuses.len(), 2);
        assert_eq!(tree.campuses[0].name, "Cyberjaya");
        assert_eq!(tree.campuses[0].faculties.len(), 2);
        assert_eq!(tree.campuses[0].faculties[0].courses.len(), 2);
        assert_eq!(tree.campuses[1].faculties.len(), 0);
        assert_eq!(tree.support_providers.len(), 2);
    }

    #[test]
    fn inactive_nodes_are_pruned() {
        let mut items = fixture();
        items[2].active = false; // Faculty of Computing

        let tree = build_option_tree(&items);
        // The faculty and, with it, its courses disappear.
        assert_eq!(tree.campuses[0].faculties.len(), 1);
        assert_eq!(tree.campuses[0].faculties[0].name, "Faculty of Engineering");
    }

    #[test]
    fn orphaned_faculty_is_excluded() {
        let mut items = fixture();
        items.push(item(9, OptionKind::Faculty, "Ghost Faculty", Some(99), true, 0));

        let tree = build_option_tree(&items);
        let names: Vec<&str> = tree.campuses[0]
            .faculties
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert!(!names.contains(&"Ghost Faculty"));
    }

    #[test]
    fn siblings_follow_position_order() {
        let mut items = fixture();
        items[3].position = -1; // Engineering before Computing

        let tree = build_option_tree(&items);
        assert_eq!(tree.campuses[0].faculties[0].name, "Faculty of Engineering");
    }

    fn indexed(items: Vec<application_option_item::Model>) -> HashMap<i32, application_option_item::Model> {
        items.into_iter().map(|i| (i.id, i)).collect()
    }

    #[test]
    fn valid_course_path_passes() {
        let items = indexed(fixture());
        assert!(check_course_path(&items, 1, 3, 5).is_ok());
    }

    #[test]
    fn broken_chain_fails_even_when_every_node_exists() {
        // Faculty 3 belongs to campus 1, not campus 2.
        let items = indexed(fixture());
        assert!(matches!(
            check_course_path(&items, 2, 3, 5),
            Err(AppError::InvalidPath(_))
        ));

        // Course 5 belongs to faculty 3, not faculty 4.
        assert!(matches!(
            check_course_path(&items, 1, 4, 5),
            Err(AppError::InvalidPath(_))
        ));
    }

    #[test]
    fn missing_or_inactive_course_is_invalid_course() {
        let items = indexed(fixture());
        assert!(matches!(
            check_course_path(&items, 1, 3, 999),
            Err(AppError::InvalidCourse(_))
        ));

        let mut inactive = fixture();
        inactive[4].active = false; // BSc Computer Science
        assert!(matches!(
            check_course_path(&indexed(inactive), 1, 3, 5),
            Err(AppError::InvalidCourse(_))
        ));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        // Selecting a campus id where a course is expected.
        let items = indexed(fixture());
        assert!(matches!(
            check_course_path(&items, 1, 3, 2),
            Err(AppError::InvalidCourse(_))
        ));
    }
}
