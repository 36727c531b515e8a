//! Chunked, pull-based download of a device's readings.
//!
//! The upstream range endpoint serves at most one day per request. A longer
//! window is walked in consecutive sub-windows of [`SECONDS_PER_DAY`]; the
//! next request is only issued once the previous sub-window has been drained
//! from the stream.

use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use solarsync_types::Reading;
use solarsync_types::timestamp::{SECONDS_PER_DAY, parse_rfc3339, round_to_cents};

use crate::api::{AccessToken, MeteringApi, RawSample};
use crate::error::{Error, Result};

/// Iterator over the `[start, end)` sub-windows covering `[from, to)`.
///
/// Each sub-window spans at most one day; the last one is clamped to `to`.
/// An empty or inverted range yields nothing.
///
/// # Examples
///
/// ```
/// use solarsync_core::fetch::SubWindows;
///
/// let windows: Vec<_> = SubWindows::new(0, 100_000).collect();
/// assert_eq!(windows, vec![(0, 86_400), (86_400, 100_000)]);
/// ```
#[derive(Debug, Clone)]
pub struct SubWindows {
    next: i64,
    to: i64,
}

impl SubWindows {
    /// Split `[from, to)` into day-sized windows.
    #[must_use]
    pub fn new(from: i64, to: i64) -> Self {
        Self { next: from, to }
    }
}

impl Iterator for SubWindows {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.to {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(SECONDS_PER_DAY).min(self.to);
        self.next = end;
        Some((start, end))
    }
}

/// Streams normalized readings for one device at a time.
pub struct ChunkedFetcher<'a, A: ?Sized> {
    api: &'a A,
    token: &'a AccessToken,
}

struct FetchState<'a, A: ?Sized> {
    api: &'a A,
    token: &'a AccessToken,
    site_id: String,
    device_id: String,
    interval: u32,
    windows: SubWindows,
    pending: std::vec::IntoIter<Reading>,
    last: Option<i64>,
}

impl<'a, A: MeteringApi + ?Sized> ChunkedFetcher<'a, A> {
    /// Create a fetcher that issues requests with `token`.
    pub fn new(api: &'a A, token: &'a AccessToken) -> Self {
        Self { api, token }
    }

    /// Lazily fetch `device_id`'s readings in `[from, to)` at `interval` seconds.
    ///
    /// The stream is strictly ascending by timestamp: each sub-window is
    /// sorted, samples outside it are dropped, and a timestamp that does not
    /// advance past the previous one is skipped. Energy values are rounded to
    /// two decimals. The first error ends the stream.
    pub fn fetch(
        &self,
        device_id: &str,
        site_id: &str,
        from: i64,
        to: i64,
        interval: u32,
    ) -> BoxStream<'a, Result<Reading>> {
        let state = FetchState {
            api: self.api,
            token: self.token,
            site_id: site_id.to_string(),
            device_id: device_id.to_string(),
            interval,
            windows: SubWindows::new(from, to),
            pending: Vec::new().into_iter(),
            last: None,
        };

        stream::try_unfold(state, |mut state| async move {
            loop {
                if let Some(reading) = state.pending.next() {
                    return Ok::<_, Error>(Some((reading, state)));
                }
                let Some((start, end)) = state.windows.next() else {
                    return Ok(None);
                };

                debug!("Fetching {} for [{}, {})", state.device_id, start, end);
                let samples = state
                    .api
                    .sensor_range(state.token, &state.device_id, start, end, state.interval)
                    .await?;

                let readings = normalize(
                    &state.site_id,
                    &state.device_id,
                    samples,
                    (start, end),
                    &mut state.last,
                )?;
                debug!("{} readings from sub-window", readings.len());
                state.pending = readings.into_iter();
            }
        })
        .boxed()
    }
}

/// Convert one sub-window's samples to sorted, in-range, strictly increasing readings.
fn normalize(
    site_id: &str,
    device_id: &str,
    samples: Vec<RawSample>,
    (start, end): (i64, i64),
    last: &mut Option<i64>,
) -> Result<Vec<Reading>> {
    let mut parsed = samples
        .into_iter()
        .map(|sample| {
            let timestamp = parse_rfc3339(&sample.date).map_err(|e| {
                Error::malformed(&format!("/v1/data/sensor/{}/range", device_id), e.to_string())
            })?;
            Ok((timestamp, sample))
        })
        .collect::<Result<Vec<_>>>()?;
    parsed.sort_by_key(|(timestamp, _)| *timestamp);

    let mut readings = Vec::with_capacity(parsed.len());
    for (timestamp, sample) in parsed {
        if timestamp < start || timestamp >= end {
            continue;
        }
        if last.is_some_and(|prev| timestamp <= prev) {
            continue;
        }
        *last = Some(timestamp);
        readings.push(Reading::new(
            site_id,
            device_id,
            timestamp,
            round_to_cents(sample.exported_wh),
            round_to_cents(sample.imported_wh),
        ));
    }
    Ok(readings)
}
