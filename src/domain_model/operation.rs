use std::fmt;

/// Every proxied call the service knows about.
///
/// The wire name doubles as the first cache-key segment, so renaming a variant
/// silently orphans whatever is cached under the old name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Me,
    TopTracks,
    TopArtists,
    PlayTrack,
    Artist,
    ArtistAlbums,
    MyPlaylists,
    RecentlyPlayed,
    SearchTracks,
    NextPage,
    LastFmArtistInfo,
    LastFmArtistTopTracks,
    SimilarArtistLink,
    TrackUrl,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Me => "me",
            Operation::TopTracks => "top-tracks",
            Operation::TopArtists => "top-artists",
            Operation::PlayTrack => "play-track",
            Operation::Artist => "artist",
            Operation::ArtistAlbums => "artist-albums",
            Operation::MyPlaylists => "my-playlists",
            Operation::RecentlyPlayed => "recently-played",
            Operation::SearchTracks => "search-tracks",
            Operation::NextPage => "next-page",
            Operation::LastFmArtistInfo => "lastfm-artist-info",
            Operation::LastFmArtistTopTracks => "lastfm-artist-top-tracks",
            Operation::SimilarArtistLink => "similar-artist-link",
            Operation::TrackUrl => "track-url",
        }
    }

    /// Whether the upstream result depends on who is asking.
    pub fn is_user_scoped(self) -> bool {
        matches!(
            self,
            Operation::Me
                | Operation::TopTracks
                | Operation::TopArtists
                | Operation::PlayTrack
                | Operation::MyPlaylists
                | Operation::RecentlyPlayed
                | Operation::NextPage
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
