/// An entry of the user's document library.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CourseEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: Option<String>,
    pub summary: Option<String>,
    pub concepts: Vec<String>,
    pub is_favorite: bool,
    pub is_archived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CourseFlag {
    Favorite,
    Archived,
}

impl CourseFlag {
    pub fn get(self, course: &CourseEntry) -> bool {
        match self {
            CourseFlag::Favorite => course.is_favorite,
            CourseFlag::Archived => course.is_archived,
        }
    }

    pub fn set(self, course: &mut CourseEntry, value: bool) {
        match self {
            CourseFlag::Favorite => course.is_favorite = value,
            CourseFlag::Archived => course.is_archived = value,
        }
    }

    /// Field name used by the status endpoint.
    pub fn field_name(self) -> &'static str {
        match self {
            CourseFlag::Favorite => "is_favorite",
            CourseFlag::Archived => "is_archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryTab {
    /// Everything not archived.
    #[default]
    All,
    Favorites,
    Archived,
}

/// Courses visible under `tab` whose title or url contains `search`
/// (case-insensitive). An empty search matches everything.
pub fn filter_courses<'a>(
    courses: &'a [CourseEntry],
    tab: LibraryTab,
    search: &str,
) -> Vec<&'a CourseEntry> {
    let needle = search.trim().to_lowercase();
    courses
        .iter()
        .filter(|course| {
            needle.is_empty()
                || course.title.to_lowercase().contains(&needle)
                || course.url.to_lowercase().contains(&needle)
        })
        .filter(|course| match tab {
            LibraryTab::All => !course.is_archived,
            LibraryTab::Favorites => course.is_favorite,
            LibraryTab::Archived => course.is_archived,
        })
        .collect()
}
