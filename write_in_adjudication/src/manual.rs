/*!

This is the long-form manual for `write_in_adjudication` and `wiadj`.

## Election files

`wiadj` works on one election at a time, described by a JSON file. The file
holds the contests with their official rosters, the cast vote records, the
write-ins found on the ballots and where they sit on the ballot images.
Adjudication results are stored in the same file: pass `--out` with the
path of the input file to update it in place.

```json
{
  "settings": {
    "imageScale": 0.5,
    "viewportWidth": 1200,
    "viewportHeight": 800,
    "pruneUnreferencedCandidates": true
  },
  "electionId": "election-1",
  "contests": [
    {
      "id": "best-animal-mammal",
      "title": "Best Animal",
      "candidates": [
        { "id": "fox", "name": "Fox" },
        { "id": "otter", "name": "Otter" },
        { "id": "write-in-0", "name": "Write-In", "isWriteIn": true }
      ]
    }
  ],
  "castVoteRecords": [
    { "id": "cvr-a", "votes": { "best-animal-mammal": ["fox"] } }
  ],
  "writeIns": [
    {
      "id": "win0",
      "electionId": "election-1",
      "contestId": "best-animal-mammal",
      "optionId": "write-in-0",
      "cvrId": "cvr-a",
      "status": "pending",
      "sequence": 0
    }
  ],
  "writeInCandidates": [],
  "images": [
    {
      "writeInId": "win0",
      "cvrId": "cvr-a",
      "image": "images/cvr-a-front.jpg",
      "ballotBounds": { "x": 0, "y": 0, "width": 100, "height": 100 },
      "contestBounds": { "x": 0, "y": 0, "width": 100, "height": 50 },
      "writeInBounds": { "x": 40, "y": 20, "width": 60, "height": 20 }
    }
  ]
}
```

Notes:
- `settings` is optional, and so is each of its fields. The defaults are the
  values above.
- Roster entries flagged `isWriteIn` are the write-in slots of the printed
  ballot. They are not candidates and write-ins cannot be credited to them.
- `sequence` is the order in which the write-ins were scanned. The review
  queue of a contest follows it.
- `votes` lists the bubble-marked options of the ballot per contest. They
  are used to detect double votes.
- An adjudicated write-in has a status of the form
  `{"adjudicated": {"adjudicationType": "official-candidate", "candidateId": "fox"}}`.
  The adjudication type is one of `official-candidate`, `write-in-candidate`
  and `invalid`; the last one has no `candidateId`.

## Commands

All the commands print their result in JSON. With `--reference`, the output
is compared with the content of the given file and the command fails on
any difference.

- `metadata [--contest ID]`: total and pending write-ins per contest.
- `queue --contest ID`: the write-ins of a contest in review order.
- `first-pending --contest ID`: the first write-in left to review.
- `context --write-in ID`: the write-in, the other write-ins of its ballot
  and the bubble marks of the ballot.
- `candidates --contest ID`: the official and write-in candidates.
- `records [--contest ID] [--cvr ID] [--write-in ID]`: the stored write-ins,
  ordered by ballot.
- `add-candidate --contest ID --name NAME`: registers a write-in candidate.
  Names are unique in a contest, ignoring case and surrounding spaces.
- `adjudicate --write-in ID --type TYPE [--candidate ID] [--expected-version N]`:
  resolves a write-in. If crediting the candidate would count the ballot
  twice for that candidate, the advisory is printed and nothing is written
  unless `--confirm` is passed as well. With `--expected-version`, the
  command is rejected when the write-in changed in the meantime.
- `view --write-in ID [--zoom in|out] [--viewport WxH]`: where to draw the
  ballot image so that the write-in area is centered, or the whole ballot
  when zoomed out.

## Double votes

A ballot is flagged when the selected candidate is also:
1. bubble-marked on the ballot in the same contest (official candidates only),
2. the adjudication of another write-in of the ballot in the same contest.

The check is advisory. The library never refuses a commit because of it;
the review session and `wiadj` ask for a confirmation.

## Image geometry

With `k` the image scale, the ballot is shown zoomed out at scale `k`. Zoomed
in, the scale is `(ballot width / write-in width) * k` and the image is moved
so that the center of the write-in area lands on the center of the viewport.
For a 100 pixel wide ballot, a 60 pixel wide write-in area and `k = 0.5`,
the ballot is drawn 83.33 pixels wide zoomed in and 50 pixels wide zoomed out.

 */
