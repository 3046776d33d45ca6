//! In-memory filtering, sorting and pagination for ticket lists.

use std::cmp::Ordering;

use crate::model::Ticket;
use crate::workflow::TicketStatus;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TicketSortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Status,
}

impl TicketSortKey {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" | "created_at" => Some(Self::CreatedAt),
            "updated" | "updated_at" => Some(Self::UpdatedAt),
            "title" => Some(Self::Title),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    pub search: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<String>,
    pub sort_key: TicketSortKey,
    pub descending: bool,
    pub page: usize,
    pub page_size: usize,
}

impl Default for TicketQuery {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            priority: None,
            sort_key: TicketSortKey::default(),
            descending: true,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped into `1..=total_pages`.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl TicketQuery {
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self.status.is_some_and(|status| status != ticket.status) {
            return false;
        }
        if let Some(priority) = self.priority.as_deref() {
            let matches_priority = ticket
                .priority
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(priority.trim()));
            if !matches_priority {
                return false;
            }
        }
        match self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
        {
            Some(needle) => {
                let needle = needle.to_lowercase();
                ticket.title.to_lowercase().contains(&needle)
                    || ticket.description.to_lowercase().contains(&needle)
                    || ticket.id.eq_ignore_ascii_case(&needle)
            }
            None => true,
        }
    }

    #[must_use]
    pub fn apply<'a>(&self, tickets: &'a [Ticket]) -> Page<&'a Ticket> {
        let mut selected = tickets
            .iter()
            .filter(|ticket| self.matches(ticket))
            .collect::<Vec<_>>();
        selected.sort_by(|left, right| {
            let ordering = compare(self.sort_key, left, right);
            if self.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        paginate(selected, self.page, self.page_size)
    }
}

fn compare(key: TicketSortKey, left: &Ticket, right: &Ticket) -> Ordering {
    let primary = match key {
        TicketSortKey::CreatedAt => left.created_at.cmp(&right.created_at),
        TicketSortKey::UpdatedAt => left
            .updated_at
            .or(left.created_at)
            .cmp(&right.updated_at.or(right.created_at)),
        TicketSortKey::Title => left.title.to_lowercase().cmp(&right.title.to_lowercase()),
        TicketSortKey::Status => status_rank(left.status).cmp(&status_rank(right.status)),
    };
    primary.then_with(|| left.id.cmp(&right.id))
}

fn status_rank(status: TicketStatus) -> usize {
    TicketStatus::ALL
        .iter()
        .position(|candidate| *candidate == status)
        .unwrap_or(usize::MAX)
}

#[must_use]
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();
    Page {
        items,
        page,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ticket(id: &str, title: &str, status: TicketStatus, day: u32) -> Ticket {
        Ticket {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{title} details"),
            status,
            priority: Some(if day % 2 == 0 { "high" } else { "low" }.to_string()),
            category: None,
            subcategory: None,
            created_by: None,
            assigned_to: None,
            approver: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, day, 8, 0, 0).single(),
            updated_at: None,
        }
    }

    fn fixture() -> Vec<Ticket> {
        vec![
            ticket("1", "VPN down", TicketStatus::Open, 1),
            ticket("2", "New laptop", TicketStatus::InProgress, 2),
            ticket("3", "vpn slow", TicketStatus::Resolved, 3),
            ticket("4", "Badge access", TicketStatus::Open, 4),
        ]
    }

    #[test]
    fn default_query_sorts_newest_first() {
        let tickets = fixture();
        let page = TicketQuery::default().apply(&tickets);
        let ids = page.items.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["4", "3", "2", "1"]);
        assert_eq!(page.total_items, 4);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn search_is_case_insensitive_across_title_and_description() {
        let tickets = fixture();
        let query = TicketQuery {
            search: Some("VPN".to_string()),
            descending: false,
            ..TicketQuery::default()
        };
        let ids = query
            .apply(&tickets)
            .items
            .iter()
            .map(|t| t.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn status_and_priority_filters_combine() {
        let tickets = fixture();
        let query = TicketQuery {
            status: Some(TicketStatus::Open),
            priority: Some("HIGH".to_string()),
            ..TicketQuery::default()
        };
        let page = query.apply(&tickets);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "4");
    }

    #[test]
    fn sort_by_title_ascending_ignores_case() {
        let tickets = fixture();
        let query = TicketQuery {
            sort_key: TicketSortKey::Title,
            descending: false,
            ..TicketQuery::default()
        };
        let titles = query
            .apply(&tickets)
            .items
            .iter()
            .map(|t| t.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Badge access", "New laptop", "VPN down", "vpn slow"]);
    }

    #[test]
    fn paginate_clamps_out_of_range_pages() {
        let page = paginate((1..=7).collect::<Vec<_>>(), 9, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items, vec![7]);

        let first = paginate((1..=7).collect::<Vec<_>>(), 0, 3);
        assert_eq!(first.page, 1);
        assert_eq!(first.items, vec![1, 2, 3]);
    }

    #[test]
    fn paginate_empty_input_yields_single_empty_page() {
        let page = paginate(Vec::<u8>::new(), 1, 10);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 0);
        assert!(page.items.is_empty());
    }
}
