use crate::h2::frame::Type;
use crate::h2::state::StreamState;

use StreamState as S;
use Type as T;

const TYPES: [Type; 10] = [
    T::Data,
    T::Headers,
    T::Priority,
    T::RstStream,
    T::Settings,
    T::PushPromise,
    T::Ping,
    T::GoAway,
    T::WindowUpdate,
    T::Continuation,
];

/// Frames permitted in each state before the END_STREAM overlay, as `(type, next)`.
///
/// `None` as type means every type not otherwise listed is permitted without change.
fn legal(recv: bool, from: StreamState) -> &'static [(Option<Type>, StreamState)] {
    match (recv, from) {
        (true, S::Idle) => &[
            (Some(T::Headers), S::Open),
            (Some(T::Priority), S::Idle),
            (Some(T::PushPromise), S::ReservedRemote),
        ],
        (true, S::ReservedLocal) => &[
            (Some(T::Priority), S::ReservedLocal),
            (Some(T::WindowUpdate), S::ReservedLocal),
            (Some(T::RstStream), S::Closed),
        ],
        (true, S::HalfClosedRemote) => &[
            (Some(T::Priority), S::HalfClosedRemote),
            (Some(T::WindowUpdate), S::HalfClosedRemote),
            (Some(T::RstStream), S::Closed),
        ],
        (true, S::ReservedRemote) => &[
            (Some(T::Headers), S::HalfClosedLocal),
            (Some(T::Priority), S::ReservedRemote),
            (Some(T::RstStream), S::Closed),
        ],
        (true, S::Open) => &[(Some(T::RstStream), S::Closed), (None, S::Open)],
        (true, S::HalfClosedLocal) => &[
            (Some(T::RstStream), S::Closed),
            (None, S::HalfClosedLocal),
        ],
        (_, S::Closed) => &[(Some(T::Priority), S::Closed)],

        (false, S::Idle) => &[
            (Some(T::Headers), S::Open),
            (Some(T::Priority), S::Idle),
            (Some(T::PushPromise), S::ReservedLocal),
        ],
        (false, S::ReservedLocal) => &[
            (Some(T::Headers), S::HalfClosedRemote),
            (Some(T::Priority), S::ReservedLocal),
            (Some(T::RstStream), S::Closed),
        ],
        (false, S::ReservedRemote) => &[
            (Some(T::Priority), S::ReservedRemote),
            (Some(T::WindowUpdate), S::ReservedRemote),
            (Some(T::RstStream), S::Closed),
        ],
        (false, S::HalfClosedLocal) => &[
            (Some(T::Priority), S::HalfClosedLocal),
            (Some(T::WindowUpdate), S::HalfClosedLocal),
            (Some(T::RstStream), S::Closed),
        ],
        (false, S::Open) => &[(Some(T::RstStream), S::Closed), (None, S::Open)],
        (false, S::HalfClosedRemote) => &[
            (Some(T::Data), S::HalfClosedRemote),
            (Some(T::Headers), S::HalfClosedRemote),
            (Some(T::Priority), S::HalfClosedRemote),
            (Some(T::RstStream), S::Closed),
        ],
    }
}

fn expected(recv: bool, from: StreamState, ty: Type, end_stream: bool) -> Option<StreamState> {
    let table = legal(recv, from);
    let base = table
        .iter()
        .find(|(t, _)| *t == Some(ty))
        .or_else(|| table.iter().find(|(t, _)| t.is_none()))
        .map(|(_, to)| *to)?;

    if !end_stream {
        return Some(base);
    }
    Some(match base {
        S::Open if recv => S::HalfClosedRemote,
        S::Open => S::HalfClosedLocal,
        S::HalfClosedLocal | S::HalfClosedRemote => S::Closed,
        other => other,
    })
}

#[test]
fn transition_matrix() {
    let mut checked = 0;
    for recv in [true, false] {
        for from in StreamState::ALL {
            for ty in TYPES {
                for end_stream in [false, true] {
                    assert_eq!(
                        from.transition(recv, ty, end_stream),
                        expected(recv, from, ty, end_stream),
                        "recv={recv} from={from:?} ty={ty:?} end_stream={end_stream}",
                    );
                    checked += 1;
                }
            }
        }
    }
    assert_eq!(checked, 2 * 7 * 10 * 2);
}

#[test]
fn idle_receive() {
    assert_eq!(S::Idle.transition(true, T::Headers, false), Some(S::Open));
    assert_eq!(S::Idle.transition(true, T::Headers, true), Some(S::HalfClosedRemote));
    assert_eq!(S::Idle.transition(true, T::Priority, false), Some(S::Idle));
    assert_eq!(S::Idle.transition(true, T::PushPromise, false), Some(S::ReservedRemote));
    assert_eq!(S::Idle.transition(true, T::Data, false), None);
    assert_eq!(S::Idle.transition(true, T::RstStream, false), None);
}

#[test]
fn direction_is_asymmetric() {
    assert_eq!(S::Idle.transition(false, T::PushPromise, false), Some(S::ReservedLocal));
    assert_eq!(S::ReservedLocal.transition(false, T::Headers, false), Some(S::HalfClosedRemote));
    assert_eq!(S::ReservedLocal.transition(true, T::Headers, false), None);
    assert_eq!(S::ReservedRemote.transition(true, T::Headers, false), Some(S::HalfClosedLocal));
    assert_eq!(S::ReservedRemote.transition(false, T::Headers, false), None);
}

#[test]
fn end_stream_overlay() {
    assert_eq!(S::Open.transition(true, T::Data, true), Some(S::HalfClosedRemote));
    assert_eq!(S::Open.transition(false, T::Data, true), Some(S::HalfClosedLocal));
    assert_eq!(S::HalfClosedLocal.transition(true, T::Data, true), Some(S::Closed));
    assert_eq!(S::HalfClosedRemote.transition(false, T::Data, true), Some(S::Closed));
    assert_eq!(S::HalfClosedRemote.transition(false, T::Headers, true), Some(S::Closed));
}

#[test]
fn half_closed_remote() {
    // the peer finished, the local half may still send
    assert_eq!(S::HalfClosedRemote.transition(false, T::Data, false), Some(S::HalfClosedRemote));
    assert_eq!(S::HalfClosedRemote.transition(false, T::WindowUpdate, false), None);
    assert_eq!(S::HalfClosedRemote.transition(true, T::Data, false), None);
    assert_eq!(S::HalfClosedRemote.transition(true, T::WindowUpdate, false), Some(S::HalfClosedRemote));
}

#[test]
fn closed_only_tolerates_priority() {
    for recv in [true, false] {
        for ty in TYPES {
            let to = S::Closed.transition(recv, ty, false);
            if ty == T::Priority {
                assert_eq!(to, Some(S::Closed));
            } else {
                assert_eq!(to, None);
            }
        }
    }
}

#[test]
fn state_queries() {
    assert!(S::Open.is_readable() && S::Open.is_writable());
    assert!(S::HalfClosedLocal.is_readable() && !S::HalfClosedLocal.is_writable());
    assert!(!S::HalfClosedRemote.is_readable() && S::HalfClosedRemote.is_writable());
    assert!(!S::Idle.is_active() && !S::ReservedLocal.is_active() && !S::Closed.is_active());
    for state in StreamState::ALL {
        assert_eq!(StreamState::from_u8(state as u8), state);
    }
}
