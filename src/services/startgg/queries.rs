// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GraphQL documents sent to start.gg.

/// Page size for tournament, set and participant listings.
pub const PAGE_SIZE: u32 = 50;

pub const CURRENT_USER: &str = r#"
query CurrentUser {
  currentUser {
    id
    email
    player { gamerTag }
  }
}
"#;

pub const ALL_TOURNAMENTS: &str = r#"
query AllTournaments($page: Int, $perPage: Int) {
  currentUser {
    id
    tournaments(query: { page: $page, perPage: $perPage }) {
      nodes {
        id
        name
        slug
        startAt
        endAt
        events {
          id
          name
          startAt
          isOnline
          state
          videogame { id name }
        }
      }
    }
  }
}
"#;

pub const EVENT_DETAIL: &str = r#"
query EventDetail($id: ID!) {
  event(id: $id) {
    id
    name
    slug
    startAt
    videogame { id name }
    tournament {
      id
      name
      slug
      owner { id }
    }
    userEntrant { id }
  }
}
"#;

pub const CHECK_USER_TOURNAMENTS: &str = r#"
query CheckUserTournaments($perPage: Int!) {
  currentUser {
    tournaments(query: { perPage: $perPage }) {
      nodes { id }
    }
  }
}
"#;

const SET_FIELDS: &str = r#"
  id
  fullRoundText
  round
  identifier
  state
  slots {
    id
    entrant {
      id
      name
      participants {
        id
        user { id name }
      }
    }
  }
"#;

/// Not-started and in-progress sets of an event.
pub fn event_sets() -> String {
    format!(
        r#"
query EventSets($eventId: ID!, $page: Int, $perPage: Int, $filters: SetFilters) {{
  event(id: $eventId) {{
    id
    name
    phases {{
      id
      name
      sets(page: $page, perPage: $perPage, sortType: STANDARD, filters: $filters) {{
        nodes {{ {SET_FIELDS} }}
      }}
    }}
  }}
}}
"#
    )
}

pub fn set_detail() -> String {
    format!(
        r#"
query SetDetail($setId: ID!) {{
  set(id: $setId) {{
    {SET_FIELDS}
    event {{ id name }}
    phaseGroup {{ id }}
  }}
}}
"#
    )
}

pub const MARK_SET_IN_PROGRESS: &str = r#"
mutation MarkSetInProgress($setId: ID!) {
  markSetInProgress(setId: $setId) {
    id
    state
  }
}
"#;

pub const REPORT_BRACKET_SET: &str = r#"
mutation ReportBracketSet($setId: ID!, $winnerId: ID!, $gameData: [BracketSetGameDataInput]) {
  reportBracketSet(setId: $setId, winnerId: $winnerId, gameData: $gameData) {
    id
    state
  }
}
"#;

/// Sent with the application token.
pub const TOURNAMENT_ADMINS: &str = r#"
query TournamentAdmins($slug: String!) {
  tournament(slug: $slug) {
    id
    name
    owner { id }
    admins {
      id
      name
      user { id slug }
    }
  }
}
"#;

/// Fallback when `admins` comes back empty for the application token.
pub const TOURNAMENT_PARTICIPANTS_ADMINS: &str = r#"
query TournamentParticipantsAdmins($slug: String!, $page: Int!, $perPage: Int!) {
  tournament(slug: $slug) {
    id
    owner { id }
    participants(query: { page: $page, perPage: $perPage }, isAdmin: true) {
      nodes {
        id
        user { id slug }
      }
    }
  }
}
"#;

/// Sent with the user's own token.
pub const TOURNAMENT_ADMINS_VIA_USER: &str = r#"
query TournamentAdminsViaUser($slug: String!) {
  tournament(slug: $slug) {
    owner { id }
    admins { id }
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_fields_are_inlined() {
        let q = event_sets();
        assert!(q.contains("fullRoundText"));
        assert!(q.contains("sortType: STANDARD"));
        assert!(!q.contains("SET_FIELDS"));
        assert!(set_detail().contains("phaseGroup { id }"));
    }
}
